//! Domain models for the admin server.
//!
//! Models are what repositories return and handlers serialize. Request
//! bodies (`*Input`) live next to the model they produce and are validated
//! in the service layer before reaching a repository.

pub mod agreement;
pub mod comment;
pub mod envelope;
pub mod household;
pub mod location;
pub mod parcel;
pub mod session;
pub mod sms;
pub mod verification;

pub use agreement::{Agreement, AgreementStatus};
pub use comment::{Comment, CommentInput, CommentView};
pub use envelope::{ApiError, ApiFailure, ApiResponse};
pub use household::{
    Household, HouseholdData, HouseholdDetail, HouseholdInput, HouseholdMember, HouseholdSummary,
    MemberInput, Pet, PetInput,
};
pub use location::{LocationInput, PickupLocation};
pub use parcel::{FoodParcel, ParcelState, ParcelView, ScheduleParcelInput};
pub use session::{MembershipCheck, SessionUser, keys as session_keys};
pub use sms::SmsRecord;
pub use verification::{VerificationQuestion, VerificationQuestionInput};

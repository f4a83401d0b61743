//! Members module: approved members and flirt interactions.
//!
//! A demonstration business module exercising the full module contract:
//! it subscribes to registration approvals published by an admissions
//! workflow, folds them (and flirts) into a private view model, serves
//! the member list publicly, lets authenticated members flirt, and
//! resets cleanly between test scenarios.

pub mod module;
pub mod types;

pub use module::{FlirtRequest, MODULE_NAME, MembersModule};
pub use types::{Birthday, Flirt, Gender, MemberCard, MemberEvent, MembersView, Portrait};

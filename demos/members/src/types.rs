//! Domain types for the members module.
//!
//! The module listens for registration approvals and flirt interactions
//! and maintains a denormalized, module-private view of approved members
//! and who flirted with whom. Nothing outside this crate touches the
//! view; other modules see only the events and the HTTP surface.

use chrono::{DateTime, NaiveDate, Utc};
use modulith_core::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Member gender, as captured at registration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// Male member.
    Male,
    /// Female member.
    Female,
}

/// A member's birthday; age is derived, never stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday(NaiveDate);

impl Birthday {
    /// Create a birthday from a calendar date.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The underlying date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole years of age on the given day.
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.0).unwrap_or(0)
    }
}

/// Portrait shown on a member card; unset portraits fall back to a
/// gender-specific placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Portrait {
    /// Placeholder portrait for male members without a photo.
    NoPortraitMale,
    /// Placeholder portrait for female members without a photo.
    NoPortraitFemale,
    /// An uploaded portrait.
    Url(String),
}

impl Portrait {
    /// The placeholder portrait for a gender.
    #[must_use]
    pub const fn default_for(gender: Gender) -> Self {
        match gender {
            Gender::Male => Self::NoPortraitMale,
            Gender::Female => Self::NoPortraitFemale,
        }
    }
}

/// Events the members module publishes and subscribes to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum MemberEvent {
    /// A registration passed approval; the member exists from here on.
    RegistrationApproved {
        /// The approved registration.
        registration_id: Uuid,
        /// The new member's identity (also their stream key).
        member_id: Uuid,
        /// Display name.
        name: String,
        /// Gender as registered.
        gender: Gender,
        /// Birthday as registered.
        birthday: Birthday,
        /// Contact email.
        email: String,
        /// Portrait, or a placeholder.
        portrait: Portrait,
    },

    /// A directed flirt from one member to another.
    FlirtSent {
        /// Identity of this flirt.
        flirt_id: Uuid,
        /// The flirting member.
        from: Uuid,
        /// The member being flirted with.
        to: Uuid,
    },
}

impl Event for MemberEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MemberEvent::RegistrationApproved { .. } => "RegistrationApproved.v1",
            MemberEvent::FlirtSent { .. } => "FlirtSent.v1",
        }
    }
}

/// One approved member, as the view model knows them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberCard {
    /// Member identity.
    pub member_id: Uuid,
    /// Display name.
    pub name: String,
    /// Gender.
    pub gender: Gender,
    /// Birthday; age is computed per request.
    pub birthday: Birthday,
    /// Portrait or placeholder.
    pub portrait: Portrait,
    /// When the approval event occurred.
    pub approved_at: DateTime<Utc>,
}

/// One recorded flirt interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flirt {
    /// Identity of the flirt.
    pub flirt_id: Uuid,
    /// The flirting member.
    pub from: Uuid,
    /// The member being flirted with.
    pub to: Uuid,
    /// When the flirt occurred.
    pub sent_at: DateTime<Utc>,
}

/// The module's denormalized view model.
///
/// A pure function of the ordered event sequence the module received:
/// folding the same sequence from empty always rebuilds this exact
/// state, and re-folding an already-applied event changes nothing
/// (members key on `member_id`, flirts on `flirt_id`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MembersView {
    members: HashMap<Uuid, MemberCard>,
    flirts: HashMap<Uuid, Flirt>,
}

impl MembersView {
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the view. Idempotent.
    pub fn apply(&mut self, event: &MemberEvent, occurred_at: DateTime<Utc>) {
        match event {
            MemberEvent::RegistrationApproved {
                member_id,
                name,
                gender,
                birthday,
                portrait,
                ..
            } => {
                self.members.insert(
                    *member_id,
                    MemberCard {
                        member_id: *member_id,
                        name: name.clone(),
                        gender: *gender,
                        birthday: *birthday,
                        portrait: portrait.clone(),
                        approved_at: occurred_at,
                    },
                );
            }
            MemberEvent::FlirtSent { flirt_id, from, to } => {
                self.flirts.insert(
                    *flirt_id,
                    Flirt {
                        flirt_id: *flirt_id,
                        from: *from,
                        to: *to,
                        sent_at: occurred_at,
                    },
                );
            }
        }
    }

    /// Wipe the view back to empty. The reset hook calls this.
    pub fn clear(&mut self) {
        self.members.clear();
        self.flirts.clear();
    }

    /// Look up one member.
    #[must_use]
    pub fn member(&self, member_id: &Uuid) -> Option<&MemberCard> {
        self.members.get(member_id)
    }

    /// All approved members, unordered.
    pub fn members(&self) -> impl Iterator<Item = &MemberCard> {
        self.members.values()
    }

    /// Number of approved members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// All recorded flirts, unordered.
    pub fn flirts(&self) -> impl Iterator<Item = &Flirt> {
        self.flirts.values()
    }

    /// Flirts directed from one member to another.
    #[must_use]
    pub fn flirts_between(&self, from: &Uuid, to: &Uuid) -> usize {
        self.flirts
            .values()
            .filter(|f| f.from == *from && f.to == *to)
            .count()
    }

    /// Whether the view holds no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.flirts.is_empty()
    }
}

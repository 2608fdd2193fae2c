pub mod case;
pub mod client;
pub mod invoice;
pub mod message;
pub mod notice;
pub mod time_entry;
pub mod timestamp;
pub mod user;

use rust_decimal::{Decimal, RoundingStrategy};

pub use case::{Case, CaseDocument, CasePriority, CaseStatus, CaseType, TimelineEvent, TimelineEventType};
pub use client::{Client, ClientStatus, ClientType};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus, Payment};
pub use message::Message;
pub use notice::{Notice, NoticeAudience, NoticePriority};
pub use time_entry::TimeEntry;
pub use user::{Role, User, UserProfile};

/// Money amounts are kept to cents, rounding half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

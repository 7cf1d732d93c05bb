pub mod calendar;
pub mod conversation;
pub mod event;
pub mod message;
pub mod user;

pub use calendar::{Calendar, CalendarPatch, NewCalendar};
pub use conversation::Conversation;
pub use event::{parse_event_stamp, Event, EventPatch, NewEvent};
pub use message::{Message, Role};
pub use user::{NewUser, User};

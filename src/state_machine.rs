//! Session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds events in, swaps in the returned session, and executes the
//! returned effects.

mod effect;
pub mod event;
pub mod guard;
pub mod reveal;
pub mod script;
pub mod selection;
pub mod state;
pub(crate) mod transition;
pub mod view;


pub use effect::Effect;
pub use event::Event;
pub use guard::FlightId;
pub use state::{Message, Session, SessionContext, Timing};
pub use transition::transition;
pub use view::SessionView;

pub mod events;
pub mod outbound;

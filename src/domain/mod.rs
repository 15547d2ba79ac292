pub mod message;

pub use message::{Dossier, DossierEntry, Message, MessageDraft, User, UserToken};

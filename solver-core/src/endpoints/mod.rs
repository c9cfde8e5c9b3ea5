pub mod ask;
pub mod conversation;
pub mod status;
pub mod upload;

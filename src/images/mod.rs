pub mod services;

pub use services::{delete_avatar, upload_avatar, UploadItem, MAX_AVATAR_BYTES};

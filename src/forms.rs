use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::{
    accounts::Gender,
    error::ApiError,
    images::{services::is_image, UploadItem, MAX_AVATAR_BYTES},
    validation::{self, ValidationError},
};

pub const PICTURE_FIELD: &str = "profilePicture";

/// `Json<T>` whose rejections render as a 400 `{message}` body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// Text fields of a multipart form plus the optional profile picture.
#[derive(Default)]
pub struct ProfileForm {
    pub fields: HashMap<String, String>,
    pub picture: Option<UploadItem>,
}

impl ProfileForm {
    pub async fn read(mut mp: Multipart) -> Result<Self, ApiError> {
        let mut form = ProfileForm::default();
        while let Some(field) = mp.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == PICTURE_FIELD {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await?;
                // an empty file input is sent as a zero-length part
                if body.is_empty() {
                    continue;
                }
                if !is_image(&content_type) {
                    return Err(ApiError::bad_request("Only image files are allowed"));
                }
                if body.len() > MAX_AVATAR_BYTES {
                    return Err(ApiError::bad_request("File upload error: File too large"));
                }
                form.picture = Some(UploadItem { body, content_type });
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn require(&self, key: &str, missing: &'static str) -> Result<&str, ValidationError> {
        self.get(key).ok_or(ValidationError(missing))
    }

    /// Validated `name`, `age` and `gender`, all required.
    pub fn profile(&self) -> Result<ProfileInput, ValidationError> {
        Ok(ProfileInput {
            name: validation::name(self.require("name", "Name is required")?)?,
            age: validation::age_str(self.require("age", "Age is required")?)?,
            gender: validation::gender(self.require("gender", "Please select a valid gender")?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInput {
    pub name: String,
    pub age: i32,
    pub gender: Gender,
}

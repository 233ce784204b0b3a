// region:    --- Imports
use crate::storage::model::User;
use crate::storage::Storage;
use std::sync::Arc;
use tracing::info;
// endregion: --- Imports

// region:    --- User Service
/// 사용자 로그인 서비스
///
/// 등록이나 비밀번호 개념이 없으므로 이름으로 조회하고 없으면 새로 만든다.
pub struct UserService {
    storage: Arc<Storage>,
}

impl UserService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// 로그인: 기존 사용자 반환 또는 신규 생성
    pub async fn login(&self, username: &str) -> Result<User, String> {
        if username.is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if let Some(id) = self.storage.get_user_id(username).await? {
            return Ok(User {
                id,
                username: username.to_string(),
            });
        }

        let id = self.storage.create_user(username).await?;
        info!("{:<12} --> 신규 사용자 생성: '{}', id={}", "UserService", username, id);
        Ok(User {
            id,
            username: username.to_string(),
        })
    }
}
// endregion: --- User Service

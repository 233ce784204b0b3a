// region:    --- Imports
use crate::storage::model::UserId;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
// endregion: --- Imports

// region:    --- Transaction Log
/// 추가 전용 거래 로그
///
/// 입금, 출금, 수수료, 체결 내역을 타임스탬프가 붙은 한 줄 텍스트로 남긴다.
pub struct TransactionLog {
    file: Mutex<File>,
}

impl TransactionLog {
    /// 거래 로그 파일을 추가 전용 모드로 연다. 없으면 생성한다.
    pub fn open(path: &Path) -> Result<Self, String> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open transaction log '{}': {e}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// 한 줄 기록: `<unix초.밀리초>: user{id=N} <메시지>`
    pub fn log(&self, user_id: UserId, message: &str) {
        let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
        let entry = format!("{timestamp:.3}: user{{id={user_id}}} {message}\n");

        let Ok(mut file) = self.file.lock() else {
            return;
        };
        // 로그 기록 실패가 거래 자체를 실패시키지는 않는다
        let _ = file.write_all(entry.as_bytes());
        let _ = file.flush();
    }
}
// endregion: --- Transaction Log

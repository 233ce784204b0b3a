// region:    --- Imports
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
// endregion: --- Imports

// region:    --- Database Manager
/// SQLite 데이터베이스 매니저
///
/// 모든 저장소 변경은 단일 커넥션 풀을 통해 직렬화된다.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 데이터베이스 파일 열기 (없으면 생성)
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        Self::connect(options).await
    }

    /// 인메모리 데이터베이스 열기 (테스트용)
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        // 커넥션을 하나로 제한하여 모든 변경이 저장소 계층에서 직렬화되도록 한다
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;
        let manager = Self { pool };
        manager.initialize_database().await?;
        Ok(manager)
    }

    /// 데이터베이스 풀 가져오기
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 트랜잭션 실행
    ///
    /// 클로저가 `Ok`를 반환하면 커밋, `Err`를 반환하면 롤백한다.
    /// 커밋 전에 중단되는 모든 경로에서 `sqlx::Transaction`이 드롭되며 롤백된다.
    pub async fn transaction<F, R>(&self, f: F) -> Result<R, String>
    where
        F: for<'c> FnOnce(
            &'c mut sqlx::Transaction<'_, sqlx::Sqlite>,
        ) -> Pin<Box<dyn Future<Output = Result<R, String>> + Send + 'c>>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("Failed to start transaction: {e}"))?;
        let result = f(&mut tx).await;
        match result {
            Ok(r) => {
                tx.commit()
                    .await
                    .map_err(|e| format!("Failed to commit transaction: {e}"))?;
                Ok(r)
            }
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| format!("Failed to rollback transaction: {e}"))?;
                Err(e)
            }
        }
    }

    /// 데이터베이스 초기화
    async fn initialize_database(&self) -> Result<(), sqlx::Error> {
        // 01-create-schema.sql 실행
        let create_schema_sql = include_str!("../sql/01-create-schema.sql");
        self.execute_multi_query(create_schema_sql).await?;
        Ok(())
    }

    /// 여러 쿼리 실행
    async fn execute_multi_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        for query in sql.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}
// endregion: --- Database Manager

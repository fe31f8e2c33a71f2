//! Redis-based tenant run lock
//!
//! One advisory lock per tenant serializes runs and rollbacks. Lua scripts
//! keep acquire and release atomic; the TTL lease prevents permanent locks
//! when a coordinator crashes mid-run.

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use cogs_service_core::services::TenantLockService;
use cogs_service_core::Result;
use shared_error::AppError;

/// Redis-based implementation of TenantLockService
pub struct RedisTenantLockService {
    redis_client: redis::Client,
}

impl RedisTenantLockService {
    pub fn new(redis_url: &str) -> Result<Self> {
        let redis_client = redis::Client::open(redis_url)
            .map_err(|e| AppError::LockError(format!("Redis client error: {}", e)))?;

        Ok(Self { redis_client })
    }

    fn lock_key(&self, tenant_id: Uuid) -> String {
        format!("cogs_run_lock:{}", tenant_id)
    }

    fn generate_lock_token(&self) -> String {
        Uuid::now_v7().to_string()
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::LockError(format!("Redis connection error: {}", e)))
    }
}

#[async_trait]
impl TenantLockService for RedisTenantLockService {
    async fn acquire(&self, tenant_id: Uuid, ttl_seconds: u32) -> Result<Option<String>> {
        let lock_key = self.lock_key(tenant_id);
        let lock_token = self.generate_lock_token();
        let mut conn = self.connection().await?;

        // Atomic SET NX EX
        let script = r#"
            if redis.call("SET", KEYS[1], ARGV[1], "NX", "EX", ARGV[2]) then
                return "OK"
            else
                return nil
            end
        "#;

        let result: Option<String> = redis::Script::new(script)
            .key(&lock_key)
            .arg(&lock_token)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::LockError(format!("Redis script error: {}", e)))?;

        match result {
            Some(_) => Ok(Some(lock_token)),
            None => Ok(None), // Lock already held
        }
    }

    async fn release(&self, tenant_id: Uuid, lock_token: &str) -> Result<bool> {
        let lock_key = self.lock_key(tenant_id);
        let mut conn = self.connection().await?;

        // Atomic check-and-delete
        let script = r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#;

        let result: i32 = redis::Script::new(script)
            .key(&lock_key)
            .arg(lock_token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::LockError(format!("Redis script error: {}", e)))?;

        Ok(result == 1)
    }

    async fn is_locked(&self, tenant_id: Uuid) -> Result<bool> {
        let lock_key = self.lock_key(tenant_id);
        let mut conn = self.connection().await?;

        let exists: bool = conn
            .exists(&lock_key)
            .await
            .map_err(|e| AppError::LockError(format!("Redis exists error: {}", e)))?;

        Ok(exists)
    }

    async fn force_release(&self, tenant_id: Uuid) -> Result<bool> {
        let lock_key = self.lock_key(tenant_id);
        let mut conn = self.connection().await?;

        tracing::warn!(%tenant_id, "force releasing tenant run lock");
        let result: i32 = conn
            .del(&lock_key)
            .await
            .map_err(|e| AppError::LockError(format!("Redis del error: {}", e)))?;

        Ok(result == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercised only when a Redis instance is reachable; the in-memory lock
    // covers the trait contract in the coordinator tests.
    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn redis_lock_acquire_release_cycle() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let service = match RedisTenantLockService::new(&redis_url) {
            Ok(s) => s,
            Err(_) => return, // Skip if cannot connect
        };

        let tenant_id = Uuid::now_v7();

        let token = service.acquire(tenant_id, 30).await.unwrap();
        assert!(token.is_some());

        // Second acquisition is refused while held.
        let second = service.acquire(tenant_id, 30).await.unwrap();
        assert!(second.is_none());

        assert!(service.is_locked(tenant_id).await.unwrap());

        let released = service.release(tenant_id, &token.unwrap()).await.unwrap();
        assert!(released);
        assert!(!service.is_locked(tenant_id).await.unwrap());
    }
}

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::{CustomerStatus, EligibilityStore, normalize_ip};

/// 客户参考表中的一行（管理工具展示用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub id: i64,
    pub name: Option<String>,
    pub active: bool,
}

/// 基于 SQLite 的资格参考表（客户 / IP 黑名单 / UA 黑名单）
#[derive(Clone)]
pub struct SqliteEligibilityStore {
    pool: SqlitePool,
}

impl SqliteEligibilityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS customer (
            id INTEGER PRIMARY KEY,
            name TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS ip_blacklist (
            ip TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS ua_blacklist (
            ua TEXT PRIMARY KEY
        );
        "#;
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("init eligibility schema: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl EligibilityStore for SqliteEligibilityStore {
    async fn customer_status(&self, customer_id: i64) -> Result<CustomerStatus, StoreError> {
        let row = sqlx::query("SELECT active FROM customer WHERE id = ?")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("query customer: {e}")))?;
        let Some(row) = row else {
            return Ok(CustomerStatus::NotFound);
        };
        let active: bool = row
            .try_get("active")
            .map_err(|e| StoreError::Database(format!("decode customer.active: {e}")))?;
        Ok(if active {
            CustomerStatus::Active
        } else {
            CustomerStatus::Inactive
        })
    }

    async fn is_user_agent_blacklisted(&self, user_agent: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM ua_blacklist WHERE ua = ? LIMIT 1")
            .bind(user_agent)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("query ua blacklist: {e}")))?;
        Ok(row.is_some())
    }

    async fn is_ip_blacklisted(&self, remote_ip: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM ip_blacklist WHERE ip = ? LIMIT 1")
            .bind(normalize_ip(remote_ip))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("query ip blacklist: {e}")))?;
        Ok(row.is_some())
    }
}

// 参考表维护：只供管理工具与测试夹具使用，服务进程不调用。
impl SqliteEligibilityStore {
    pub async fn upsert_customer(
        &self,
        id: i64,
        name: Option<&str>,
        active: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO customer(id, name, active) VALUES(?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = COALESCE(excluded.name, customer.name),
               active = excluded.active",
        )
        .bind(id)
        .bind(name)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("upsert customer: {e}")))?;
        Ok(())
    }

    /// 修改客户启用状态，返回客户是否存在
    pub async fn set_customer_active(&self, id: i64, active: bool) -> Result<bool, StoreError> {
        let affected = sqlx::query("UPDATE customer SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("update customer: {e}")))?
            .rows_affected();
        Ok(affected == 1)
    }

    pub async fn list_customers(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, name, active FROM customer ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("list customers: {e}")))?;
        rows.into_iter()
            .map(|r| {
                Ok(CustomerRecord {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    active: r.try_get("active")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| StoreError::Database(format!("decode customer row: {e}")))
    }

    /// 加入 IP 黑名单，返回是否为新条目
    pub async fn add_blacklisted_ip(&self, ip: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("INSERT OR IGNORE INTO ip_blacklist(ip) VALUES(?)")
            .bind(normalize_ip(ip))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("insert ip blacklist: {e}")))?
            .rows_affected();
        Ok(affected == 1)
    }

    pub async fn remove_blacklisted_ip(&self, ip: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM ip_blacklist WHERE ip = ?")
            .bind(normalize_ip(ip))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("delete ip blacklist: {e}")))?
            .rows_affected();
        Ok(affected == 1)
    }

    /// 加入 UA 黑名单（精确匹配），返回是否为新条目
    pub async fn add_blacklisted_user_agent(&self, ua: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("INSERT OR IGNORE INTO ua_blacklist(ua) VALUES(?)")
            .bind(ua)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("insert ua blacklist: {e}")))?
            .rows_affected();
        Ok(affected == 1)
    }

    pub async fn remove_blacklisted_user_agent(&self, ua: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query("DELETE FROM ua_blacklist WHERE ua = ?")
            .bind(ua)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("delete ua blacklist: {e}")))?
            .rows_affected();
        Ok(affected == 1)
    }

    pub async fn list_blacklisted_ips(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT ip FROM ip_blacklist ORDER BY ip ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("list ip blacklist: {e}")))
    }

    pub async fn list_blacklisted_user_agents(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT ua FROM ua_blacklist ORDER BY ua ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("list ua blacklist: {e}")))
    }
}

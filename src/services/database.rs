use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{error, info};

/// 数据库服务
/// 对 SurrealDB 客户端的薄封装，查询失败统一落到 AppError::Database
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_endpoint);

        let client = Surreal::new::<Http>(config.database_endpoint.as_str()).await?;

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;

        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        self.client.query(sql).await.map_err(AppError::from)
    }

    /// 执行带参数的查询，参数为JSON对象
    pub async fn query_with_params(&self, sql: &str, params: Value) -> Result<Response> {
        let mut query = self.client.query(sql);

        if let Value::Object(map) = params {
            for (key, value) in map {
                query = query.bind((key, value));
            }
        }

        query.await.map_err(AppError::from)
    }

    /// 创建记录，记录ID由调用方提供
    /// content 中的 id 字段会被剥离，避免与记录ID冲突
    pub async fn create<T>(&self, table: &str, id: &str, data: &T) -> Result<()>
    where
        T: Serialize + Send + Sync + Debug,
    {
        let mut content = serde_json::to_value(data)?;
        if let Some(object) = content.as_object_mut() {
            object.remove("id");
        }

        self.query_with_params(
            "CREATE type::thing($table, $id) CONTENT $data RETURN NONE",
            json!({
                "table": table,
                "id": id,
                "data": content
            }),
        )
        .await?;

        Ok(())
    }

    /// 通过ID获取单个记录
    pub async fn get_by_id<T>(&self, table: &str, id: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de> + Send + Sync + Debug,
    {
        let mut response = self
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM type::thing($table, $id)",
                json!({
                    "table": table,
                    "id": id
                }),
            )
            .await?;

        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 执行计数查询，SQL 需要返回 `count` 列（SELECT count() AS count ... GROUP ALL）
    pub async fn count(&self, sql: &str, params: Value) -> Result<usize> {
        let mut response = self.query_with_params(sql, params).await?;
        let rows: Vec<Value> = response.take(0)?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0) as usize)
    }
}

pub mod test_helpers {
    use crate::mcp::{normalize_url, EndpointIntrospection, IntrospectionError, IntrospectionReport};
    use crate::models::{
        EndpointSpec, HttpMethod, RegisterServerRequest, ServerRecord, ToolDescriptor,
        TransportKind,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Map, Value};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_pool() -> Result<SqlitePool, sqlx::Error> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when a test reopens the database through a second pool
    pub async fn create_test_pool_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        Ok((pool, temp_file))
    }

    pub fn number_schema() -> Map<String, Value> {
        match json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["a", "b"]
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn tools(specs: &[(&str, &str)]) -> Vec<ToolDescriptor> {
        specs
            .iter()
            .map(|(name, description)| ToolDescriptor::new(*name, *description, number_schema()))
            .collect()
    }

    pub fn sample_record_with_tools(
        id: &str,
        name: &str,
        description: &str,
        tool_specs: &[(&str, &str)],
    ) -> ServerRecord {
        let now = Utc::now();
        ServerRecord {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags: vec!["test".to_string()],
            url: format!("http://{}.internal", id),
            transport: TransportKind::Sse,
            tools: tools(tool_specs),
            resources: vec![],
            prompts: vec![],
            created_at: now,
            last_heartbeat: now,
            list_tools_endpoint: "/sse".to_string(),
            call_tool_endpoint: "/call_tool".to_string(),
            list_tools_endpoint_method: HttpMethod::Post,
            call_endpoint_method: HttpMethod::Post,
        }
    }

    pub fn sample_record(id: &str, tool_names: &[&str]) -> ServerRecord {
        let specs: Vec<(&str, &str)> = tool_names.iter().map(|name| (*name, "")).collect();
        sample_record_with_tools(id, "Calculator", "Arithmetic tools", &specs)
    }

    pub fn sample_request() -> RegisterServerRequest {
        let mut request = RegisterServerRequest::new(
            "Calculator",
            "Arithmetic tools for agents",
            "http://calc.internal/sse",
        );
        request.tags = vec!["math".to_string()];
        request
    }

    /// Introspector returning a preset tool list, for driving the
    /// registration pipeline without a network.
    #[derive(Clone, Default)]
    pub struct ScriptedIntrospector {
        tools: Arc<Mutex<Option<Vec<ToolDescriptor>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedIntrospector {
        pub fn with_tools(specs: &[(&str, &str)]) -> Self {
            let introspector = Self::default();
            introspector.set_tools(specs);
            introspector
        }

        /// Every call fails as an unreachable endpoint.
        pub fn failing() -> Self {
            Self::default()
        }

        pub fn set_tools(&self, specs: &[(&str, &str)]) {
            if let Ok(mut slot) = self.tools.lock() {
                *slot = Some(tools(specs));
            }
        }

        pub fn fail(&self) {
            if let Ok(mut slot) = self.tools.lock() {
                *slot = None;
            }
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl EndpointIntrospection for ScriptedIntrospector {
        async fn introspect(
            &self,
            endpoint: &EndpointSpec,
        ) -> Result<IntrospectionReport, IntrospectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let tools = self
                .tools
                .lock()
                .ok()
                .and_then(|slot| slot.clone())
                .ok_or_else(|| IntrospectionError::Handshake("connection refused".to_string()))?;

            let target = normalize_url(&endpoint.url, &endpoint.list_tools_endpoint);
            Ok(IntrospectionReport {
                base_url: target.base_url,
                introspection_url: target.introspection_url,
                tools,
                list_method: endpoint.list_method,
            })
        }
    }
}

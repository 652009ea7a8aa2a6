use crate::Result;
use crate::llm::Message;
use async_trait::async_trait;
use schemars::{JsonSchema, schema_for};

pub struct ToolDefinition {
    pub name: String,
    pub desc: String,
    pub params: serde_json::Value,
}

impl ToolDefinition {
    pub fn new<P: JsonSchema>(name: &str, desc: &str) -> Result<Self> {
        let schema = schema_for!(P);
        let params = serde_json::to_value(&schema.schema)?;
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            params,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: String,
}

impl ToolCall {
    pub fn args<O: for<'de> serde::Deserialize<'de>>(&self) -> Result<O> {
        let args = serde_json::from_str(&self.args)?;
        Ok(args)
    }

    /// The raw arguments as a JSON value, for observers that want the input
    /// payload without knowing the tool's schema.
    pub fn input(&self) -> serde_json::Value {
        serde_json::from_str(&self.args)
            .unwrap_or_else(|_| serde_json::Value::String(self.args.clone()))
    }
}

#[async_trait]
pub trait Tool {
    fn definition(&self) -> Result<ToolDefinition>;

    async fn invoke(&mut self, call: &ToolCall, messages: Vec<Message>) -> Result<Vec<Message>>;
}

#[async_trait]
pub trait FunctionalTool {
    fn definition(&self) -> Result<ToolDefinition>;

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message>;
}

// Tool failure is data the model reasons over: an Err from a functional tool
// becomes an error tool message rather than aborting the turn.
#[async_trait]
impl<T> Tool for T
where
    T: FunctionalTool + Send + Sync,
{
    fn definition(&self) -> Result<ToolDefinition> {
        FunctionalTool::definition(self)
    }

    async fn invoke(
        &mut self,
        call: &ToolCall,
        mut messages: Vec<Message>,
    ) -> Result<Vec<Message>> {
        let result = match FunctionalTool::invoke_fn(self, call).await {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool invocation failed");
                Message::Tool {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    result: format!("Error: {err}"),
                }
            }
        };
        messages.push(result);
        Ok(messages)
    }
}

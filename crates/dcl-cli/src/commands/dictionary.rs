//! `dcl dictionary` command implementation

use crate::api::SubmissionClient;
use crate::config::Config;
use crate::error::Result;

/// Print the dictionary schema of one node (`_all` for everything)
pub async fn run(config: &Config, node: &str) -> Result<()> {
    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let schema = client.dictionary_node(node).await?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

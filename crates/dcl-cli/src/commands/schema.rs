//! `dcl schema` command implementation

use crate::api::SubmissionClient;
use crate::config::Config;
use crate::error::Result;

/// Print the GraphQL schema of the commons
pub async fn run(config: &Config) -> Result<()> {
    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let schema = client.graphql_schema().await?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

//! API endpoint URL builders
//!
//! Helper functions to construct API endpoint URLs. `base_url` is the
//! commons endpoint without a trailing slash.

/// Submission root; programs are created here (POST)
pub fn submission_root_url(base_url: &str) -> String {
    format!("{}/api/v0/submission/", base_url)
}

/// One program: project creation (PUT) and program deletion (DELETE)
pub fn program_url(base_url: &str, program: &str) -> String {
    format!("{}/api/v0/submission/{}", base_url, program)
}

/// Project node submission (PUT) and project deletion (DELETE)
pub fn submission_url(base_url: &str, program: &str, project: &str) -> String {
    format!("{}/api/v0/submission/{}/{}", base_url, program, project)
}

/// Export of specific records by id
pub fn export_record_url(
    base_url: &str,
    program: &str,
    project: &str,
    ids: &str,
    format: &str,
) -> String {
    format!(
        "{}/api/v0/submission/{}/{}/export?ids={}&format={}",
        base_url,
        program,
        project,
        urlencoding::encode(ids),
        format
    )
}

/// Export of every record of one node type
pub fn export_node_url(
    base_url: &str,
    program: &str,
    project: &str,
    node_label: &str,
    format: &str,
) -> String {
    format!(
        "{}/api/v0/submission/{}/{}/export/?node_label={}&format={}",
        base_url,
        program,
        project,
        urlencoding::encode(node_label),
        format
    )
}

/// Entity deletion (DELETE)
pub fn entity_url(base_url: &str, program: &str, project: &str, id: &str) -> String {
    format!(
        "{}/api/v0/submission/{}/{}/entities/{}",
        base_url, program, project, id
    )
}

/// GraphQL query (POST)
pub fn graphql_url(base_url: &str) -> String {
    format!("{}/api/v0/submission/graphql", base_url)
}

/// GraphQL schema introspection result
pub fn graphql_schema_url(base_url: &str) -> String {
    format!("{}/api/v0/submission/getschema", base_url)
}

/// Data dictionary entry for one node
pub fn dictionary_url(base_url: &str, node: &str) -> String {
    format!("{}/api/v0/submission/_dictionary/{}", base_url, node)
}

/// Index record by guid
pub fn index_record_url(base_url: &str, guid: &str) -> String {
    format!("{}/index/index/{}", base_url, guid)
}

/// API key to access token exchange (POST)
pub fn access_token_url(base_url: &str) -> String {
    format!("{}/user/credentials/api/access_token", base_url)
}

//! DS GraphQL API client
//!
//! The `DsApi` trait is the service boundary: the sync logic only depends on
//! it, so tests inject fakes without touching the network.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::wire::{
    DossierPage, MutationPayload, RemoteError, RemoteInstructor, TransitionDossier,
};

/// The four remote state-transition mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    PassToInstruction,
    Accept,
    Refuse,
    ClassifyWithoutContinuation,
}

impl TransitionKind {
    /// GraphQL mutation field name on the remote schema.
    #[must_use]
    pub const fn mutation_name(self) -> &'static str {
        match self {
            Self::PassToInstruction => "dossierPasserEnInstruction",
            Self::Accept => "dossierAccepter",
            Self::Refuse => "dossierRefuser",
            Self::ClassifyWithoutContinuation => "dossierClasserSansSuite",
        }
    }

    const fn input_type(self) -> &'static str {
        match self {
            Self::PassToInstruction => "DossierPasserEnInstructionInput",
            Self::Accept => "DossierAccepterInput",
            Self::Refuse => "DossierRefuserInput",
            Self::ClassifyWithoutContinuation => "DossierClasserSansSuiteInput",
        }
    }
}

/// Input for one remote state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionInput {
    pub kind: TransitionKind,
    /// Remote technical id of the dossier
    pub dossier_id: String,
    /// Remote instructor id acting on the dossier
    pub instructor_id: String,
    /// Suppress remote notifications (intermediate compound steps)
    pub disable_notification: bool,
    pub motivation: Option<String>,
}

/// Result of a successful remote transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub state: super::wire::RemoteState,
    pub date_depot: Option<chrono::DateTime<chrono::Utc>>,
    pub date_passage_en_instruction: Option<chrono::DateTime<chrono::Utc>>,
    pub date_traitement: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<TransitionDossier> for TransitionOutcome {
    fn from(dossier: TransitionDossier) -> Self {
        Self {
            state: dossier.state,
            date_depot: dossier.date_depot,
            date_passage_en_instruction: dossier.date_passage_en_instruction,
            date_traitement: dossier.date_traitement,
        }
    }
}

/// Capabilities the sync logic needs from the DS API.
#[allow(async_fn_in_trait)]
pub trait DsApi {
    /// Fetch the instructors assigned to a procedure.
    async fn instructors(&self, procedure: i64) -> Result<Vec<RemoteInstructor>>;

    /// Fetch one page of account-update dossiers.
    async fn applications_page(
        &self,
        procedure: i64,
        cursor: Option<&str>,
    ) -> Result<DossierPage>;

    /// Fetch the application numbers of dossiers deleted on the remote side.
    async fn deleted_application_numbers(&self, procedure: i64) -> Result<Vec<i64>>;

    /// Execute one state-transition mutation.
    ///
    /// A non-empty `errors` payload becomes `Error::DsRejected` carrying the
    /// remote message verbatim.
    async fn apply_transition(&self, input: &TransitionInput) -> Result<TransitionOutcome>;

    /// Archive a dossier.
    async fn archive(&self, dossier_id: &str, instructor_id: &str) -> Result<()>;
}

/// reqwest-backed implementation of `DsApi`.
#[derive(Clone)]
pub struct DsGraphqlClient {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

const INSTRUCTORS_QUERY: &str = "\
query GetInstructors($demarcheNumber: Int!) {
  demarche(number: $demarcheNumber) {
    groupeInstructeurs { instructeurs { id email } }
  }
}";

const APPLICATIONS_QUERY: &str = "\
query GetAccountUpdateApplications($demarcheNumber: Int!, $after: String) {
  demarche(number: $demarcheNumber) {
    dossiers(after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes {
        id
        number
        state
        archived
        dateDepot
        dateDerniereModification
        dateDerniereModificationChamps
        datePassageEnInstruction
        dateTraitement
        usager { email }
        demandeur { ... on PersonnePhysique { nom prenom dateDeNaissance } }
        champs { label ... on TextChamp { value } ... on MultipleDropDownListChamp { values } }
        messages { email createdAt correction { dateResolution } }
      }
    }
  }
}";

const DELETED_APPLICATIONS_QUERY: &str = "\
query GetDeletedApplications($demarcheNumber: Int!) {
  demarche(number: $demarcheNumber) {
    deletedDossiers { nodes { number } }
  }
}";

const ARCHIVE_MUTATION: &str = "\
mutation ArchiveApplication($input: DossierArchiverInput!) {
  dossierArchiver(input: $input) {
    dossier { id }
    errors { message }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<Vec<RemoteError>>,
}

#[derive(Debug, Deserialize)]
struct InstructorGroup {
    instructeurs: Vec<RemoteInstructor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructorsDemarche {
    #[serde(default)]
    groupe_instructeurs: Vec<InstructorGroup>,
}

#[derive(Debug, Deserialize)]
struct ApplicationsDemarche {
    dossiers: DossierPage,
}

#[derive(Debug, Deserialize)]
struct DeletedNode {
    number: i64,
}

#[derive(Debug, Deserialize)]
struct DeletedConnection {
    #[serde(default)]
    nodes: Vec<DeletedNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedDemarche {
    deleted_dossiers: DeletedConnection,
}

#[derive(Debug, Deserialize)]
struct DemarcheData<T> {
    demarche: T,
}

impl DsGraphqlClient {
    /// Create a client for the given GraphQL endpoint and API token.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let token = normalize_text_option(Some(token.into()))
            .ok_or_else(|| Error::InvalidInput("DS API token must not be empty".to_string()))?;

        Ok(Self {
            endpoint,
            token,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Execute one GraphQL document and return the `data` payload.
    async fn execute(
        &self,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::DsApi(parse_api_error(status, &body)));
        }

        let envelope = response.json::<GraphqlEnvelope>().await?;

        if let Some(errors) = envelope.errors {
            if let Some(first) = errors.first() {
                return Err(Error::DsApi(first.message.clone()));
            }
        }

        envelope
            .data
            .ok_or_else(|| Error::DsApi("response did not include data".to_string()))
    }

    fn mutation_payload(
        data: serde_json::Value,
        field_name: &str,
    ) -> Result<MutationPayload> {
        let payload = data
            .get(field_name)
            .cloned()
            .ok_or_else(|| Error::DsApi(format!("response did not include {field_name}")))?;
        Ok(serde_json::from_value(payload)?)
    }

    fn reject_on_errors(payload: &MutationPayload) -> Result<()> {
        if let Some(errors) = &payload.errors {
            if let Some(first) = errors.first() {
                return Err(Error::DsRejected(first.message.clone()));
            }
        }
        Ok(())
    }
}

impl DsApi for DsGraphqlClient {
    async fn instructors(&self, procedure: i64) -> Result<Vec<RemoteInstructor>> {
        let data = self
            .execute(INSTRUCTORS_QUERY, json!({ "demarcheNumber": procedure }))
            .await?;
        let data: DemarcheData<InstructorsDemarche> = serde_json::from_value(data)?;

        Ok(data
            .demarche
            .groupe_instructeurs
            .into_iter()
            .flat_map(|group| group.instructeurs)
            .collect())
    }

    async fn applications_page(
        &self,
        procedure: i64,
        cursor: Option<&str>,
    ) -> Result<DossierPage> {
        let data = self
            .execute(
                APPLICATIONS_QUERY,
                json!({ "demarcheNumber": procedure, "after": cursor }),
            )
            .await?;
        let data: DemarcheData<ApplicationsDemarche> = serde_json::from_value(data)?;
        Ok(data.demarche.dossiers)
    }

    async fn deleted_application_numbers(&self, procedure: i64) -> Result<Vec<i64>> {
        let data = self
            .execute(
                DELETED_APPLICATIONS_QUERY,
                json!({ "demarcheNumber": procedure }),
            )
            .await?;
        let data: DemarcheData<DeletedDemarche> = serde_json::from_value(data)?;

        Ok(data
            .demarche
            .deleted_dossiers
            .nodes
            .into_iter()
            .map(|node| node.number)
            .collect())
    }

    async fn apply_transition(&self, input: &TransitionInput) -> Result<TransitionOutcome> {
        let mutation_name = input.kind.mutation_name();
        // One document per mutation; the remote schema exposes a distinct
        // field and input type for each transition.
        let query = transition_document(input.kind);

        let mut variables = json!({
            "dossierId": input.dossier_id,
            "instructeurId": input.instructor_id,
            "disableNotification": input.disable_notification,
        });
        if let Some(motivation) = &input.motivation {
            variables["motivation"] = json!(motivation);
        }

        let data = self.execute(query, json!({ "input": variables })).await?;
        let payload = Self::mutation_payload(data, mutation_name)?;
        Self::reject_on_errors(&payload)?;

        let dossier = payload
            .dossier
            .ok_or_else(|| Error::DsApi(format!("{mutation_name} returned no dossier")))?;
        Ok(dossier.into())
    }

    async fn archive(&self, dossier_id: &str, instructor_id: &str) -> Result<()> {
        let data = self
            .execute(
                ARCHIVE_MUTATION,
                json!({ "input": { "dossierId": dossier_id, "instructeurId": instructor_id } }),
            )
            .await?;
        let payload = Self::mutation_payload(data, "dossierArchiver")?;
        Self::reject_on_errors(&payload)
    }
}

/// Pick the static GraphQL document for one transition kind.
const fn transition_document(kind: TransitionKind) -> &'static str {
    // Kept as full documents so the wire contract is greppable.
    match kind {
        TransitionKind::PassToInstruction => {
            "mutation PassToInstruction($input: DossierPasserEnInstructionInput!) {
  dossierPasserEnInstruction(input: $input) {
    dossier { state dateDepot datePassageEnInstruction dateTraitement }
    errors { message }
  }
}"
        }
        TransitionKind::Accept => {
            "mutation AcceptApplication($input: DossierAccepterInput!) {
  dossierAccepter(input: $input) {
    dossier { state dateDepot datePassageEnInstruction dateTraitement }
    errors { message }
  }
}"
        }
        TransitionKind::Refuse => {
            "mutation RefuseApplication($input: DossierRefuserInput!) {
  dossierRefuser(input: $input) {
    dossier { state dateDepot datePassageEnInstruction dateTraitement }
    errors { message }
  }
}"
        }
        TransitionKind::ClassifyWithoutContinuation => {
            "mutation MarkWithoutContinuation($input: DossierClasserSansSuiteInput!) {
  dossierClasserSansSuite(input: $input) {
    dossier { state dateDepot datePassageEnInstruction dateTraitement }
    errors { message }
  }
}"
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_endpoint("https://api.example.com/graphql/".to_string()).unwrap(),
            "https://api.example.com/graphql"
        );
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(DsGraphqlClient::new("https://api.example.com/graphql", "  ").is_err());
    }

    #[test]
    fn mutation_names_match_remote_schema() {
        assert_eq!(
            TransitionKind::PassToInstruction.mutation_name(),
            "dossierPasserEnInstruction"
        );
        assert_eq!(TransitionKind::Accept.mutation_name(), "dossierAccepter");
        assert_eq!(TransitionKind::Refuse.mutation_name(), "dossierRefuser");
        assert_eq!(
            TransitionKind::ClassifyWithoutContinuation.mutation_name(),
            "dossierClasserSansSuite"
        );
    }

    #[test]
    fn transition_documents_name_their_input_types() {
        for kind in [
            TransitionKind::PassToInstruction,
            TransitionKind::Accept,
            TransitionKind::Refuse,
            TransitionKind::ClassifyWithoutContinuation,
        ] {
            let document = transition_document(kind);
            assert!(document.contains(kind.mutation_name()));
            assert!(document.contains(kind.input_type()));
        }
    }

    #[test]
    fn mutation_payload_surfaces_remote_rejection() {
        let data = serde_json::json!({
            "dossierAccepter": {
                "dossier": null,
                "errors": [{ "message": "Le dossier est déjà accepté" }]
            }
        });

        let payload = DsGraphqlClient::mutation_payload(data, "dossierAccepter").unwrap();
        let error = DsGraphqlClient::reject_on_errors(&payload).unwrap_err();
        assert!(matches!(error, Error::DsRejected(_)));
        assert_eq!(error.to_string(), "Le dossier est déjà accepté");
    }

    #[test]
    fn mutation_payload_missing_field_is_api_error() {
        let data = serde_json::json!({});
        let error = DsGraphqlClient::mutation_payload(data, "dossierAccepter").unwrap_err();
        assert!(matches!(error, Error::DsApi(_)));
    }

    #[test]
    fn parse_api_error_prefers_json_message() {
        let message = parse_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "invalid token"}"#,
        );
        assert_eq!(message, "invalid token (401)");

        let fallback = parse_api_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(fallback, "HTTP 502");
    }
}

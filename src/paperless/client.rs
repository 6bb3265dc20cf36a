//! Blocking HTTP client for the document service.

use std::sync::Mutex;

use reqwest::blocking::Response;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;

use super::taxonomy::TaxonomyBackend;
use super::types::{CustomField, Document, DocumentUpdate, NamedEntity, Namespace, Page};
use super::PaperlessError;

/// Documents fetched per polling cycle.
const LIST_PAGE_SIZE: u32 = 20;

/// Document operations the pipeline needs from the document service.
pub trait DocumentStore {
    fn document(&self, id: u32) -> Result<Document, PaperlessError>;

    /// Documents whose processed-marker field is false or absent,
    /// newest first, bounded to one listing page.
    fn unprocessed_documents(&self, marker_field: &str) -> Result<Vec<Document>, PaperlessError>;

    fn update_document(&self, id: u32, update: &DocumentUpdate) -> Result<(), PaperlessError>;

    /// Original binary content (the uploaded file) of a document.
    fn original_file(&self, id: u32) -> Result<Vec<u8>, PaperlessError>;
}

/// Token-authenticated client for a Paperless-ngx-compatible API.
pub struct PaperlessClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl PaperlessClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, PaperlessError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|_| PaperlessError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json; version=2"));

        let http = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaperlessError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    fn send_error(&self, e: reqwest::Error) -> PaperlessError {
        if e.is_connect() {
            PaperlessError::Unreachable(self.base_url.clone())
        } else {
            PaperlessError::Transport(e.to_string())
        }
    }

    fn check_status(&self, response: Response) -> Result<Response, PaperlessError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().unwrap_or_default();
            Err(PaperlessError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, PaperlessError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(|e| self.send_error(e))?;
        self.check_status(response)?
            .json()
            .map_err(|e| PaperlessError::ResponseShape(e.to_string()))
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, PaperlessError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .map_err(|e| self.send_error(e))?;
        self.check_status(response)?
            .json()
            .map_err(|e| PaperlessError::ResponseShape(e.to_string()))
    }

    /// Fetch a full collection by following `next` cursors to exhaustion.
    fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, PaperlessError> {
        let mut items = Vec::new();
        let mut next = Some(self.api_url(&format!("{endpoint}/")));
        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url, &[])?;
            items.extend(page.results);
            next = page.next;
        }
        Ok(items)
    }
}

/// Filter expression selecting documents whose marker field is false or absent.
pub(crate) fn unprocessed_filter(marker_field: &str) -> String {
    serde_json::json!([
        "OR",
        [
            [marker_field, "exact", "false"],
            [marker_field, "exists", "false"]
        ]
    ])
    .to_string()
}

impl DocumentStore for PaperlessClient {
    fn document(&self, id: u32) -> Result<Document, PaperlessError> {
        self.get_json(&self.api_url(&format!("documents/{id}/")), &[])
    }

    fn unprocessed_documents(&self, marker_field: &str) -> Result<Vec<Document>, PaperlessError> {
        let page: Page<Document> = self.get_json(
            &self.api_url("documents/"),
            &[
                ("custom_field_query", unprocessed_filter(marker_field)),
                ("ordering", "-created".to_string()),
                ("page_size", LIST_PAGE_SIZE.to_string()),
            ],
        )?;
        Ok(page.results)
    }

    fn update_document(&self, id: u32, update: &DocumentUpdate) -> Result<(), PaperlessError> {
        let response = self
            .http
            .patch(self.api_url(&format!("documents/{id}/")))
            .json(update)
            .send()
            .map_err(|e| self.send_error(e))?;
        self.check_status(response)?;
        Ok(())
    }

    fn original_file(&self, id: u32) -> Result<Vec<u8>, PaperlessError> {
        let response = self
            .http
            .get(self.api_url(&format!("documents/{id}/download/")))
            .send()
            .map_err(|e| self.send_error(e))?;
        let bytes = self
            .check_status(response)?
            .bytes()
            .map_err(|e| PaperlessError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl TaxonomyBackend for PaperlessClient {
    fn entities(&self, namespace: Namespace) -> Result<Vec<NamedEntity>, PaperlessError> {
        self.fetch_all(namespace.endpoint())
    }

    fn create_entity(
        &self,
        namespace: Namespace,
        name: &str,
    ) -> Result<NamedEntity, PaperlessError> {
        self.post_json(
            &self.api_url(&format!("{}/", namespace.endpoint())),
            &serde_json::json!({ "name": name }),
        )
    }

    fn boolean_field(&self, name: &str) -> Result<Option<CustomField>, PaperlessError> {
        let key = name.trim().to_lowercase();
        let fields: Vec<CustomField> = self.fetch_all("custom_fields")?;
        Ok(fields
            .into_iter()
            .find(|f| f.data_type == "boolean" && f.name.trim().to_lowercase() == key))
    }

    fn create_boolean_field(&self, name: &str) -> Result<(), PaperlessError> {
        let _: CustomField = self.post_json(
            &self.api_url("custom_fields/"),
            &serde_json::json!({ "name": name, "data_type": "boolean" }),
        )?;
        Ok(())
    }
}

/// In-memory `DocumentStore` for tests. Records every update it receives.
pub struct MockDocumentStore {
    documents: Vec<Document>,
    originals: Vec<(u32, Vec<u8>)>,
    fail_listing: bool,
    fail_updates: bool,
    updates: Mutex<Vec<(u32, DocumentUpdate)>>,
}

impl MockDocumentStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            originals: Vec::new(),
            fail_listing: false,
            fail_updates: false,
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_original(mut self, id: u32, bytes: Vec<u8>) -> Self {
        self.originals.push((id, bytes));
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn updates(&self) -> Vec<(u32, DocumentUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

impl DocumentStore for MockDocumentStore {
    fn document(&self, id: u32) -> Result<Document, PaperlessError> {
        self.documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(PaperlessError::Api {
                status: 404,
                body: format!("document {id} not found"),
            })
    }

    fn unprocessed_documents(&self, _marker_field: &str) -> Result<Vec<Document>, PaperlessError> {
        if self.fail_listing {
            return Err(PaperlessError::Api {
                status: 500,
                body: "listing unavailable".into(),
            });
        }
        Ok(self.documents.clone())
    }

    fn update_document(&self, id: u32, update: &DocumentUpdate) -> Result<(), PaperlessError> {
        if self.fail_updates {
            return Err(PaperlessError::Api {
                status: 500,
                body: "update rejected".into(),
            });
        }
        self.updates.lock().unwrap().push((id, update.clone()));
        Ok(())
    }

    fn original_file(&self, id: u32) -> Result<Vec<u8>, PaperlessError> {
        self.originals
            .iter()
            .find(|(doc_id, _)| *doc_id == id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(PaperlessError::Api {
                status: 404,
                body: format!("no original for document {id}"),
            })
    }
}

//! GraphQL media-library client
//!
//! Talks to a Stash-compatible server over `{scheme}://{host}:{port}/graphql`,
//! authenticated with the session cookie or API key handed over by the
//! plugin host.

use super::traits::{LibraryError, MediaLibrary};
use super::types::{
    Image, MarkerId, MediaId, MediaKind, MediaPath, NewSceneMarker, Scene, SceneMarker, Tag,
    TagId, TagUpdateMode,
};
use crate::plugin::ServerConnection;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("ai-tagger/", env!("CARGO_PKG_VERSION"));

const FIND_TAGS: &str = r#"
query FindTags($filter: FindFilterType, $tag_filter: TagFilterType) {
  findTags(filter: $filter, tag_filter: $tag_filter) { tags { id name } }
}"#;

const CREATE_TAG: &str = r#"
mutation TagCreate($input: TagCreateInput!) {
  tagCreate(input: $input) { id name }
}"#;

const CONFIGURATION_UI: &str = r#"
query Configuration { configuration { ui } }"#;

const FIND_IMAGES: &str = r#"
query FindImages($filter: FindFilterType, $image_filter: ImageFilterType) {
  findImages(filter: $filter, image_filter: $image_filter) { images { id files { path } } }
}"#;

const FIND_SCENES: &str = r#"
query FindScenes($filter: FindFilterType, $scene_filter: SceneFilterType) {
  findScenes(filter: $filter, scene_filter: $scene_filter) {
    scenes { id tags { id } files { path duration fingerprint(type: "phash") } }
  }
}"#;

const BULK_IMAGE_UPDATE: &str = r#"
mutation BulkImageUpdate($input: BulkImageUpdateInput!) {
  bulkImageUpdate(input: $input) { id }
}"#;

const BULK_SCENE_UPDATE: &str = r#"
mutation BulkSceneUpdate($input: BulkSceneUpdateInput!) {
  bulkSceneUpdate(input: $input) { id }
}"#;

const SCENE_MARKERS: &str = r#"
query FindScene($id: ID!) {
  findScene(id: $id) { scene_markers { id primary_tag { id } } }
}"#;

const CREATE_MARKER: &str = r#"
mutation SceneMarkerCreate($input: SceneMarkerCreateInput!) {
  sceneMarkerCreate(input: $input) { id }
}"#;

const DESTROY_MARKER: &str = r#"
mutation SceneMarkerDestroy($id: ID!) { sceneMarkerDestroy(id: $id) }"#;

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct RawTag {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct FindTagsData {
    #[serde(rename = "findTags")]
    find_tags: TagList,
}

#[derive(Deserialize)]
struct TagList {
    tags: Vec<RawTag>,
}

#[derive(Deserialize)]
struct CreateTagData {
    #[serde(rename = "tagCreate")]
    tag_create: RawTag,
}

#[derive(Deserialize)]
struct ConfigurationData {
    configuration: UiConfiguration,
}

#[derive(Deserialize)]
struct UiConfiguration {
    #[serde(default)]
    ui: Value,
}

#[derive(Deserialize)]
struct FindImagesData {
    #[serde(rename = "findImages")]
    find_images: ImageList,
}

#[derive(Deserialize)]
struct ImageList {
    images: Vec<RawImage>,
}

#[derive(Deserialize)]
struct RawImage {
    id: String,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    path: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    fingerprint: Option<String>,
}

#[derive(Deserialize)]
struct FindScenesData {
    #[serde(rename = "findScenes")]
    find_scenes: SceneList,
}

#[derive(Deserialize)]
struct SceneList {
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
struct RawScene {
    id: String,
    #[serde(default)]
    tags: Vec<IdOnly>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Deserialize)]
struct FindSceneData {
    #[serde(rename = "findScene")]
    find_scene: Option<SceneMarkers>,
}

#[derive(Deserialize)]
struct SceneMarkers {
    scene_markers: Vec<RawMarker>,
}

#[derive(Deserialize)]
struct RawMarker {
    id: String,
    primary_tag: IdOnly,
}

#[derive(Deserialize)]
struct CreateMarkerData {
    #[serde(rename = "sceneMarkerCreate")]
    scene_marker_create: IdOnly,
}

/// Unpack a GraphQL envelope, turning reported errors into [`LibraryError::Api`].
fn unpack<T>(response: GraphqlResponse<T>) -> Result<T, LibraryError> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(LibraryError::Api(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| LibraryError::Decode("response carried no data".to_string()))
}

fn all_pages() -> Value {
    json!({ "per_page": -1 })
}

fn includes_tag(tag: &TagId) -> Value {
    json!({ "value": [tag.as_str()], "modifier": "INCLUDES" })
}

/// Hierarchical filter matching `tag` and everything below it.
fn includes_tag_tree(tag: &TagId) -> Value {
    json!({ "value": [tag.as_str()], "modifier": "INCLUDES", "depth": -1 })
}

/// Media library reached over GraphQL.
pub struct StashClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl StashClient {
    /// Build a client from the host-supplied connection parameters.
    pub fn from_connection(connection: &ServerConnection) -> Result<Self, LibraryError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &connection.session_cookie {
            let value = HeaderValue::from_str(&format!("{}={}", cookie.name, cookie.value))
                .map_err(|e| LibraryError::Transport(format!("invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }
        if let Some(key) = connection.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| LibraryError::Transport(format!("invalid api key: {}", e)))?;
            headers.insert("apikey", value);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LibraryError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: connection.graphql_url(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, LibraryError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LibraryError::Api(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let envelope: GraphqlResponse<T> = response.json().await?;
        unpack(envelope)
    }
}

#[async_trait]
impl MediaLibrary for StashClient {
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, LibraryError> {
        let data: FindTagsData = self
            .call(
                FIND_TAGS,
                json!({
                    "filter": all_pages(),
                    "tag_filter": { "name": { "value": name, "modifier": "EQUALS" } },
                }),
            )
            .await?;
        let mut tags = data.find_tags.tags;
        if tags.is_empty() {
            return Ok(None);
        }
        // EQUALS is case-insensitive on the server; prefer an exact match.
        let position = tags.iter().position(|t| t.name == name).unwrap_or(0);
        let raw = tags.swap_remove(position);
        Ok(Some(Tag {
            id: TagId::new(raw.id),
            name: raw.name,
        }))
    }

    async fn create_tag(&self, name: &str, parent: Option<&TagId>) -> Result<Tag, LibraryError> {
        let parent_ids: Vec<&str> = parent.map(|p| p.as_str()).into_iter().collect();
        let data: CreateTagData = self
            .call(
                CREATE_TAG,
                json!({
                    "input": {
                        "name": name,
                        "ignore_auto_tag": true,
                        "parent_ids": parent_ids,
                    }
                }),
            )
            .await?;
        tracing::debug!(tag = name, id = %data.tag_create.id, "created tag");
        Ok(Tag {
            id: TagId::new(data.tag_create.id),
            name: data.tag_create.name,
        })
    }

    async fn descendant_tags(&self, parent: &TagId) -> Result<Vec<TagId>, LibraryError> {
        let data: FindTagsData = self
            .call(
                FIND_TAGS,
                json!({
                    "filter": all_pages(),
                    "tag_filter": { "parents": includes_tag_tree(parent) },
                }),
            )
            .await?;
        Ok(data
            .find_tags
            .tags
            .into_iter()
            .map(|t| TagId::new(t.id))
            .collect())
    }

    async fn vr_tag_name(&self) -> Result<Option<String>, LibraryError> {
        let data: ConfigurationData = self.call(CONFIGURATION_UI, json!({})).await?;
        Ok(data
            .configuration
            .ui
            .get("vrTag")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    async fn images_with_tag(&self, tag: &TagId) -> Result<Vec<Image>, LibraryError> {
        let data: FindImagesData = self
            .call(
                FIND_IMAGES,
                json!({
                    "filter": all_pages(),
                    "image_filter": { "tags": includes_tag(tag) },
                }),
            )
            .await?;

        let mut images = Vec::with_capacity(data.find_images.images.len());
        for raw in data.find_images.images {
            match raw.files.into_iter().next() {
                Some(file) => images.push(Image {
                    id: MediaId::new(raw.id),
                    path: MediaPath::parse(&file.path),
                }),
                None => tracing::error!(image_id = %raw.id, "image has no files, skipping"),
            }
        }
        Ok(images)
    }

    async fn scenes_with_tag(&self, tag: &TagId) -> Result<Vec<Scene>, LibraryError> {
        let data: FindScenesData = self
            .call(
                FIND_SCENES,
                json!({
                    "filter": all_pages(),
                    "scene_filter": { "tags": includes_tag(tag) },
                }),
            )
            .await?;

        let mut scenes = Vec::with_capacity(data.find_scenes.scenes.len());
        for raw in data.find_scenes.scenes {
            let Some(file) = raw.files.into_iter().next() else {
                tracing::error!(scene_id = %raw.id, "scene has no files, skipping");
                continue;
            };
            tracing::debug!(scene_id = %raw.id, path = %file.path, duration = ?file.duration, "listed scene");
            scenes.push(Scene {
                id: MediaId::new(raw.id),
                path: file.path,
                duration: file.duration,
                phash: file.fingerprint,
                tag_ids: raw.tags.into_iter().map(|t| TagId::new(t.id)).collect(),
            });
        }
        Ok(scenes)
    }

    async fn update_tags(
        &self,
        kind: MediaKind,
        ids: &[MediaId],
        tags: &[TagId],
        mode: TagUpdateMode,
    ) -> Result<(), LibraryError> {
        if ids.is_empty() || tags.is_empty() {
            return Ok(());
        }
        let query = match kind {
            MediaKind::Image => BULK_IMAGE_UPDATE,
            MediaKind::Scene => BULK_SCENE_UPDATE,
        };
        let ids: Vec<&str> = ids.iter().map(MediaId::as_str).collect();
        let tag_ids: Vec<&str> = tags.iter().map(TagId::as_str).collect();
        let _: Value = self
            .call(
                query,
                json!({
                    "input": {
                        "ids": ids,
                        "tag_ids": { "ids": tag_ids, "mode": mode.as_api_str() },
                    }
                }),
            )
            .await?;
        Ok(())
    }

    async fn scene_markers(&self, scene: &MediaId) -> Result<Vec<SceneMarker>, LibraryError> {
        let data: FindSceneData = self
            .call(SCENE_MARKERS, json!({ "id": scene.as_str() }))
            .await?;
        let scene_markers = data
            .find_scene
            .ok_or_else(|| LibraryError::NotFound(format!("scene {}", scene)))?
            .scene_markers;
        Ok(scene_markers
            .into_iter()
            .map(|m| SceneMarker {
                id: MarkerId::new(m.id),
                primary_tag: TagId::new(m.primary_tag.id),
            })
            .collect())
    }

    async fn create_scene_marker(&self, marker: &NewSceneMarker) -> Result<MarkerId, LibraryError> {
        let mut input = json!({
            "scene_id": marker.scene_id.as_str(),
            "primary_tag_id": marker.primary_tag.as_str(),
            "tag_ids": [marker.primary_tag.as_str()],
            "seconds": marker.seconds,
            "title": marker.title,
        });
        if let Some(end) = marker.end_seconds {
            input["end_seconds"] = json!(end);
        }
        let data: CreateMarkerData = self.call(CREATE_MARKER, json!({ "input": input })).await?;
        Ok(MarkerId::new(data.scene_marker_create.id))
    }

    async fn destroy_scene_marker(&self, marker: &MarkerId) -> Result<(), LibraryError> {
        let _: Value = self
            .call(DESTROY_MARKER, json!({ "id": marker.as_str() }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_surfaces_graphql_errors() {
        let response: GraphqlResponse<Value> = serde_json::from_value(json!({
            "data": null,
            "errors": [{ "message": "boom" }, { "message": "bang" }],
        }))
        .unwrap();
        match unpack(response) {
            Err(LibraryError::Api(msg)) => assert_eq!(msg, "boom; bang"),
            other => panic!("expected api error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unpack_without_data_is_decode_error() {
        let response: GraphqlResponse<Value> = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(unpack(response), Err(LibraryError::Decode(_))));
    }

    #[test]
    fn scene_listing_decodes_files_and_tags() {
        let data: FindScenesData = serde_json::from_value(json!({
            "findScenes": { "scenes": [{
                "id": "7",
                "tags": [{ "id": "1" }, { "id": "9" }],
                "files": [{ "path": "/v/a.mp4", "duration": 12.5, "fingerprint": "abc" }],
            }]}
        }))
        .unwrap();
        let scene = &data.find_scenes.scenes[0];
        assert_eq!(scene.tags.len(), 2);
        assert_eq!(scene.files[0].duration, Some(12.5));
        assert_eq!(scene.files[0].fingerprint.as_deref(), Some("abc"));
    }

    #[test]
    fn client_targets_graphql_endpoint() {
        let connection: ServerConnection = serde_json::from_value(json!({
            "Scheme": "http",
            "Host": "0.0.0.0",
            "Port": 9999,
            "SessionCookie": { "Name": "session", "Value": "abc" },
        }))
        .unwrap();
        let client = StashClient::from_connection(&connection).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/graphql");
    }
}

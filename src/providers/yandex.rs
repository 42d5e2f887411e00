use super::{MusicProvider, ProviderError, ProviderFactory};
/// Yandex Music provider implementation
use crate::models::{Account, Album, DownloadOption, PlaylistSummary, PlaylistUpdate, Track, TrackRef};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const DEFAULT_BASE_URL: &str = "https://api.music.yandex.net";

/// Salt used to sign direct download links
const DOWNLOAD_SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";
const COVER_SIZE: &str = "200x200";

/// Yandex Music provider state
pub struct YandexProvider {
    base_url: String,
    token: String,
    client: Client,
    uid: OnceCell<u64>,
}

/// Response envelope shared by all endpoints
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    name: Option<String>,
    message: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match (&self.name, &self.message) {
            (Some(name), Some(message)) => format!("{}: {}", name, message),
            (Some(name), None) => name.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountStatus {
    account: ApiAccount,
    default_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAccount {
    uid: Option<u64>,
    login: Option<String>,
    full_name: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAlbum {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    title: String,
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrack {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    albums: Vec<ApiAlbum>,
    duration_ms: Option<u64>,
    cover_uri: Option<String>,
    og_image: Option<String>,
    available: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrackShort {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    album_id: Option<String>,
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlaylist {
    #[serde(default)]
    title: String,
    kind: u64,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    track_count: usize,
    #[serde(default)]
    tracks: Vec<ApiTrackShort>,
}

#[derive(Debug, Deserialize)]
struct LikesResult {
    library: LikesLibrary,
}

#[derive(Debug, Deserialize)]
struct LikesLibrary {
    #[serde(default)]
    tracks: Vec<ApiTrackShort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimilarResult {
    #[serde(default)]
    similar_tracks: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDownloadInfo {
    codec: String,
    bitrate_in_kbps: u32,
    download_info_url: String,
}

#[derive(Debug, Deserialize)]
struct RevisionResult {
    revision: Option<u64>,
}

/// Identifiers come back as either numbers or strings
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

impl From<ApiTrack> for Track {
    fn from(t: ApiTrack) -> Self {
        Track {
            id: t.id,
            title: t.title,
            artists: t.artists.into_iter().map(|a| a.name).collect(),
            duration_ms: t.duration_ms.unwrap_or(0),
            albums: t
                .albums
                .into_iter()
                .map(|a| Album {
                    id: a.id,
                    title: a.title,
                    year: a.year,
                })
                .collect(),
            cover_uri: t.cover_uri.or(t.og_image),
            available: t.available.unwrap_or(true),
        }
    }
}

impl From<ApiTrackShort> for TrackRef {
    fn from(short: ApiTrackShort) -> Self {
        match short.track {
            Some(track) => TrackRef::Full(track.into()),
            None => TrackRef::Stub {
                track_id: short.id,
                album_id: short.album_id,
            },
        }
    }
}

impl From<ApiPlaylist> for PlaylistSummary {
    fn from(p: ApiPlaylist) -> Self {
        PlaylistSummary {
            title: p.title,
            kind: p.kind,
            revision: p.revision,
            track_count: p.track_count,
        }
    }
}

/// Unescaped element texts of the download-info document, by element name.
///
/// Empty elements such as `<s/>` map to an empty string.
fn download_info_fields(doc: &str) -> Result<HashMap<String, String>, ProviderError> {
    let xml_error = |e: quick_xml::Error| ProviderError::Decode(format!("download info: {}", e));

    let mut reader = Reader::from_str(doc);
    reader.config_mut().trim_text(true);

    let mut fields = HashMap::new();
    let mut open: Option<String> = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                fields.entry(name.clone()).or_insert_with(String::new);
                open = Some(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                fields.entry(name).or_insert_with(String::new);
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                if let Some(name) = &open {
                    fields.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Event::End(_) => open = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(fields)
}

/// Build the signed direct link from a download-info document
fn direct_link(doc: &str, codec: &str) -> Result<String, ProviderError> {
    let fields = download_info_fields(doc)?;
    let field = |tag: &str| {
        fields
            .get(tag)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::Decode(format!("download info is missing <{}>", tag)))
    };
    let host = field("host")?;
    let path = field("path")?;
    let ts = field("ts")?;
    let s = field("s")?;

    let signed = format!(
        "{}{}{}",
        DOWNLOAD_SIGN_SALT,
        path.strip_prefix('/').unwrap_or(path),
        s
    );
    let sign = format!("{:x}", md5::compute(signed.as_bytes()));
    Ok(format!("https://{}/get-{}/{}/{}{}", host, codec, sign, ts, path))
}

/// Map an HTTP status and response body to the envelope's `result`.
///
/// 401 and 403 mean the token was refused; any other failure status or an
/// `error` object in the body is a rejection.
fn decode_envelope<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<T, ProviderError> {
    let envelope: Option<Envelope<T>> = serde_json::from_str(body).ok();
    let api_error = envelope
        .as_ref()
        .and_then(|e| e.error.as_ref())
        .map(ApiError::describe);

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::Unauthorized(
            api_error.unwrap_or_else(|| format!("HTTP {}", status)),
        ));
    }
    if !status.is_success() {
        return Err(ProviderError::Rejected(
            api_error.unwrap_or_else(|| format!("HTTP {}", status)),
        ));
    }
    if let Some(message) = api_error {
        return Err(ProviderError::Rejected(message));
    }

    match envelope {
        Some(Envelope {
            result: Some(result),
            ..
        }) => Ok(result),
        _ => {
            // Re-parse to surface the real decode error
            serde_json::from_str::<Envelope<T>>(body)
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
            Err(ProviderError::Decode("response has no result".to_string()))
        }
    }
}

/// Expand a cover URI template into a fetchable URL
fn cover_url(cover_uri: &str) -> String {
    let uri = cover_uri.replace("%%", COVER_SIZE);
    if uri.starts_with("http") {
        uri
    } else {
        format!("https://{}", uri)
    }
}

impl YandexProvider {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
            uid: OnceCell::new(),
        }
    }

    /// Attach authentication headers to a request
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("OAuth {}", self.token))
            .header("X-Yandex-Music-Client", "YandexMusicAndroid/24023621")
    }

    /// Send a request and unwrap the `result` field of the envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        decode_envelope(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        self.send(self.client.get(&url)).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);
        self.send(self.client.post(&url).form(form)).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected(format!(
                "download failed: HTTP {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// The account uid, looked up once per provider
    async fn uid(&self) -> Result<u64, ProviderError> {
        self.uid
            .get_or_try_init(|| async { self.account().await.map(|a| a.uid) })
            .await
            .copied()
    }

    async fn change_playlist(
        &self,
        kind: u64,
        diff: Value,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError> {
        let uid = self.uid().await?;
        let playlist: ApiPlaylist = self
            .post_form(
                &format!("/users/{}/playlists/{}/change-relative", uid, kind),
                &[
                    ("kind", kind.to_string()),
                    ("revision", revision.to_string()),
                    ("diff", diff.to_string()),
                ],
            )
            .await?;

        Ok(PlaylistUpdate {
            revision: playlist.revision,
            tracks: playlist.tracks.into_iter().map(TrackRef::from).collect(),
        })
    }
}

#[async_trait]
impl MusicProvider for YandexProvider {
    async fn account(&self) -> Result<Account, ProviderError> {
        let status: AccountStatus = self.get("/account/status").await?;
        let uid = status
            .account
            .uid
            .ok_or_else(|| ProviderError::Unauthorized("token has no account".to_string()))?;
        let login = status.account.login.unwrap_or_default();
        let full_name = status
            .account
            .full_name
            .or(status.account.display_name)
            .unwrap_or_else(|| login.clone());

        Ok(Account {
            uid,
            login,
            full_name,
            email: status.default_email,
        })
    }

    async fn playlists(&self) -> Result<Vec<PlaylistSummary>, ProviderError> {
        let uid = self.uid().await?;
        let playlists: Vec<ApiPlaylist> =
            self.get(&format!("/users/{}/playlists/list", uid)).await?;
        Ok(playlists.into_iter().map(PlaylistSummary::from).collect())
    }

    async fn playlist_tracks(&self, kind: u64) -> Result<Vec<TrackRef>, ProviderError> {
        let uid = self.uid().await?;
        let playlist: ApiPlaylist = self
            .get(&format!("/users/{}/playlists/{}", uid, kind))
            .await?;
        Ok(playlist.tracks.into_iter().map(TrackRef::from).collect())
    }

    async fn liked_tracks(&self) -> Result<Vec<TrackRef>, ProviderError> {
        let uid = self.uid().await?;
        let likes: LikesResult = self.get(&format!("/users/{}/likes/tracks", uid)).await?;
        Ok(likes
            .library
            .tracks
            .into_iter()
            .map(TrackRef::from)
            .collect())
    }

    async fn fetch_tracks(&self, ids: &[String]) -> Result<Vec<Track>, ProviderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tracks: Vec<ApiTrack> = self
            .post_form(
                "/tracks",
                &[
                    ("track-ids", ids.join(",")),
                    ("with-positions", "true".to_string()),
                ],
            )
            .await?;
        Ok(tracks.into_iter().map(Track::from).collect())
    }

    async fn like_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError> {
        let uid = self.uid().await?;
        let result: RevisionResult = self
            .post_form(
                &format!("/users/{}/likes/tracks/add-multiple", uid),
                &[("track-ids", track_ids.join(","))],
            )
            .await?;
        Ok(result.revision.is_some())
    }

    async fn unlike_tracks(&self, track_ids: &[String]) -> Result<bool, ProviderError> {
        let uid = self.uid().await?;
        let result: RevisionResult = self
            .post_form(
                &format!("/users/{}/likes/tracks/remove", uid),
                &[("track-ids", track_ids.join(","))],
            )
            .await?;
        Ok(result.revision.is_some())
    }

    async fn delete_from_playlist(
        &self,
        kind: u64,
        from: usize,
        to: usize,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError> {
        let diff = json!([{ "op": "delete", "from": from, "to": to }]);
        self.change_playlist(kind, diff, revision).await
    }

    async fn insert_into_playlist(
        &self,
        kind: u64,
        at: usize,
        track_id: &str,
        album_id: &str,
        revision: u64,
    ) -> Result<PlaylistUpdate, ProviderError> {
        let diff = json!([{
            "op": "insert",
            "at": at,
            "tracks": [{ "id": track_id, "albumId": album_id }],
        }]);
        self.change_playlist(kind, diff, revision).await
    }

    async fn similar_tracks(&self, track_id: &str) -> Result<Vec<Track>, ProviderError> {
        let similar: SimilarResult = self.get(&format!("/tracks/{}/similar", track_id)).await?;
        Ok(similar
            .similar_tracks
            .into_iter()
            .map(Track::from)
            .collect())
    }

    async fn download_options(
        &self,
        track_id: &str,
    ) -> Result<Vec<DownloadOption>, ProviderError> {
        let infos: Vec<ApiDownloadInfo> = self
            .get(&format!("/tracks/{}/download-info", track_id))
            .await?;
        Ok(infos
            .into_iter()
            .map(|info| DownloadOption {
                codec: info.codec,
                bitrate_kbps: info.bitrate_in_kbps,
                info_url: info.download_info_url,
            })
            .collect())
    }

    async fn fetch_audio(&self, option: &DownloadOption) -> Result<Vec<u8>, ProviderError> {
        let doc = self
            .authorized(self.client.get(&option.info_url))
            .send()
            .await?
            .text()
            .await?;
        let link = direct_link(&doc, &option.codec)?;
        tracing::debug!("Fetching {} kbps {} audio", option.bitrate_kbps, option.codec);
        self.fetch_bytes(&link).await
    }

    async fn fetch_cover(&self, cover_uri: &str) -> Result<Vec<u8>, ProviderError> {
        self.fetch_bytes(&cover_url(cover_uri)).await
    }
}

/// Creates [`YandexProvider`]s against a fixed API base URL
pub struct YandexFactory {
    base_url: String,
}

impl YandexFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for YandexFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ProviderFactory for YandexFactory {
    async fn connect(&self, token: &str) -> Result<Arc<dyn MusicProvider>, ProviderError> {
        if token.trim().is_empty() {
            return Err(ProviderError::Unauthorized("empty token".to_string()));
        }
        Ok(Arc::new(YandexProvider::new(
            self.base_url.clone(),
            token.to_string(),
        )))
    }
}

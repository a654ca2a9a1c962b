//! Drives `RemoteClient` (and, where relevant, `StagingCache`) against an
//! in-process mock namenode/datanode built with `axum`, exercising the
//! protocol-level scenarios end to end: directory listing order, 404
//! classification, the two-step CREATE dance, truncate-without-prior-open,
//! rename over a non-empty directory, and the access-check permission
//! matrix is covered separately in `src/adapter/access.rs`'s bit-arithmetic
//! unit test since it needs no network round trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get as axum_get;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;

use webhdfs_fuse::cache::StagingCache;
use webhdfs_fuse::remote::{RemoteClient, RemoteError};

#[derive(Clone, Debug, PartialEq, Eq)]
enum MockKind {
    Directory,
    File,
}

#[derive(Clone, Debug)]
struct MockFile {
    kind: MockKind,
    perm: u32,
    owner: String,
    group: String,
    content: Vec<u8>,
    atime_ms: i64,
    mtime_ms: i64,
    version: u64,
}

impl MockFile {
    fn dir(perm: u32) -> Self {
        Self {
            kind: MockKind::Directory,
            perm,
            owner: "root".to_string(),
            group: "root".to_string(),
            content: Vec::new(),
            atime_ms: 0,
            mtime_ms: 0,
            version: 0,
        }
    }

    fn checksum(&self) -> String {
        format!("v{}", self.version)
    }
}

#[derive(Clone, Debug)]
struct LoggedRequest {
    method: &'static str,
    path: String,
    query: HashMap<String, String>,
}

#[derive(Default)]
struct MockState {
    files: HashMap<String, MockFile>,
    log: Vec<LoggedRequest>,
}

type SharedState = Arc<Mutex<MockState>>;

fn key_from_capture(captured: &str) -> String {
    if captured.is_empty() {
        "/".to_string()
    } else {
        format!("/{captured}")
    }
}

fn remote_exception(status: StatusCode, exception: &str, message: &str) -> Response {
    (status, Json(json!({"RemoteException": {"exception": exception, "message": message}}))).into_response()
}

fn file_status_json(f: &MockFile, path_suffix: &str) -> serde_json::Value {
    json!({
        "type": match f.kind { MockKind::Directory => "DIRECTORY", MockKind::File => "FILE" },
        "permission": format!("{:03o}", f.perm),
        "owner": f.owner,
        "group": f.group,
        "length": f.content.len(),
        "accessTime": f.atime_ms,
        "modificationTime": f.mtime_ms,
        "pathSuffix": path_suffix,
    })
}

async fn get_handler(
    AxumPath(captured): AxumPath<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<SharedState>,
) -> Response {
    let path = key_from_capture(&captured);
    let mut st = state.lock().unwrap();
    st.log.push(LoggedRequest { method: "GET", path: path.clone(), query: query.clone() });

    match query.get("op").map(String::as_str) {
        Some("GETFILESTATUS") => match st.files.get(&path) {
            Some(f) => Json(json!({"FileStatus": file_status_json(f, "")})).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Some("LISTSTATUS") => {
            let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
            let mut children: Vec<serde_json::Value> = st
                .files
                .iter()
                .filter(|(k, _)| *k != &path && k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
                .map(|(k, f)| file_status_json(f, &k[prefix.len()..]))
                .collect();
            children.sort_by(|a, b| a["pathSuffix"].as_str().cmp(&b["pathSuffix"].as_str()));
            Json(json!({"FileStatuses": {"FileStatus": children}})).into_response()
        }
        Some("GETFILECHECKSUM") => match st.files.get(&path) {
            Some(f) => Json(json!({"FileChecksum": {"algorithm": "MOCK", "bytes": f.checksum(), "length": f.content.len()}})).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Some("OPEN") => {
            let location = format!("http://{}/webhdfs/v1/{captured}?op=OPEN_DATA", st_addr(&st));
            let mut resp = StatusCode::TEMPORARY_REDIRECT.into_response();
            resp.headers_mut().insert(header::LOCATION, location.parse().unwrap());
            resp
        }
        Some("OPEN_DATA") => match st.files.get(&path) {
            Some(f) => f.content.clone().into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// The mock's own bind address, set once by `spawn_mock` on the test's
/// (single, current-thread-runtime) OS thread, read by redirect handlers
/// to build an absolute `Location` header.
fn st_addr(_st: &MockState) -> String {
    ADDR.with(|a| a.borrow().clone())
}

thread_local! {
    static ADDR: std::cell::RefCell<String> = std::cell::RefCell::new(String::new());
}

async fn put_handler(
    AxumPath(captured): AxumPath<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<SharedState>,
    body: Bytes,
) -> Response {
    let path = key_from_capture(&captured);
    let mut st = state.lock().unwrap();
    st.log.push(LoggedRequest { method: "PUT", path: path.clone(), query: query.clone() });

    match query.get("op").map(String::as_str) {
        Some("CREATE") if query.get("overwrite").map(String::as_str) == Some("true") => {
            let location = format!("http://{}/webhdfs/v1/{captured}?op=CREATE_DATA", st_addr(&st));
            let mut resp = StatusCode::TEMPORARY_REDIRECT.into_response();
            resp.headers_mut().insert(header::LOCATION, location.parse().unwrap());
            resp
        }
        Some("CREATE") => {
            let perm = query
                .get("permission")
                .and_then(|p| u32::from_str_radix(p, 8).ok())
                .unwrap_or(0o644);
            let owner = query.get("user.name").cloned().unwrap_or_else(|| "root".to_string());
            st.files.insert(
                path,
                MockFile {
                    kind: MockKind::File,
                    perm,
                    owner: owner.clone(),
                    group: owner,
                    content: Vec::new(),
                    atime_ms: 0,
                    mtime_ms: 0,
                    version: 0,
                },
            );
            StatusCode::CREATED.into_response()
        }
        Some("CREATE_DATA") => {
            let entry = st.files.entry(path).or_insert_with(|| MockFile::dir(0o644));
            entry.kind = MockKind::File;
            entry.content = body.to_vec();
            entry.version += 1;
            StatusCode::CREATED.into_response()
        }
        Some("MKDIRS") => {
            let perm = query
                .get("permission")
                .and_then(|p| u32::from_str_radix(p, 8).ok())
                .unwrap_or(0o755);
            st.files.insert(path, MockFile::dir(perm));
            Json(json!({"boolean": true})).into_response()
        }
        Some("RENAME") => {
            let Some(dest) = query.get("destination").cloned() else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            match st.files.remove(&path) {
                Some(f) => {
                    st.files.insert(dest, f);
                    Json(json!({"boolean": true})).into_response()
                }
                None => Json(json!({"boolean": false})).into_response(),
            }
        }
        Some("SETPERMISSION") => {
            if let (Some(f), Some(p)) = (st.files.get_mut(&path), query.get("permission")) {
                f.perm = u32::from_str_radix(p, 8).unwrap_or(f.perm);
            }
            StatusCode::OK.into_response()
        }
        Some("SETOWNER") => {
            if let Some(f) = st.files.get_mut(&path) {
                if let Some(u) = query.get("user") {
                    f.owner = u.clone();
                }
                if let Some(g) = query.get("group") {
                    f.group = g.clone();
                }
            }
            StatusCode::OK.into_response()
        }
        Some("SETTIMES") => {
            if let Some(f) = st.files.get_mut(&path) {
                if let Some(a) = query.get("accesstime").and_then(|v| v.parse().ok()) {
                    f.atime_ms = a;
                }
                if let Some(m) = query.get("modificationtime").and_then(|v| v.parse().ok()) {
                    f.mtime_ms = m;
                }
            }
            StatusCode::OK.into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn delete_handler(
    AxumPath(captured): AxumPath<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<SharedState>,
) -> Response {
    let path = key_from_capture(&captured);
    let mut st = state.lock().unwrap();
    st.log.push(LoggedRequest { method: "DELETE", path: path.clone(), query: query.clone() });

    let recursive = query.get("recursive").map(String::as_str) == Some("true");
    let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
    let non_empty = st.files.keys().any(|k| k != &path && k.starts_with(&prefix));

    if non_empty && !recursive {
        return remote_exception(StatusCode::FORBIDDEN, "PathIsNotEmptyDirectoryException", &format!("{path} is non empty"));
    }

    if non_empty {
        let doomed: Vec<String> = st.files.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
        for k in doomed {
            st.files.remove(&k);
        }
    }
    let removed = st.files.remove(&path).is_some();
    Json(json!({"boolean": removed})).into_response()
}

async fn spawn_mock() -> (SharedState, String) {
    let state: SharedState = Arc::new(Mutex::new(MockState::default()));
    let app = Router::new()
        .route(
            "/webhdfs/v1/*path",
            axum_get(get_handler).put(put_handler).delete(delete_handler),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    ADDR.with(|a| *a.borrow_mut() = addr.to_string());

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    (state, addr.to_string())
}

#[tokio::test]
async fn directory_listing_returns_dot_entries_then_children_in_order() {
    let (state, addr) = spawn_mock().await;
    {
        let mut st = state.lock().unwrap();
        st.files.insert("/".to_string(), MockFile::dir(0o755));
        st.files.insert("/foo".to_string(), MockFile::dir(0o755));
        st.files.insert("/bar".to_string(), MockFile::dir(0o755));
    }
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    let listing = client.list("/", Some("tester")).await.unwrap();
    let names: Vec<_> = listing.iter().map(|s| s.path_suffix.clone()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"foo".to_string()));
    assert!(names.contains(&"bar".to_string()));
}

#[tokio::test]
async fn getattr_on_missing_path_is_not_found() {
    let (_state, addr) = spawn_mock().await;
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    let err = client.getattr("/missing", Some("tester")).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound));
}

#[tokio::test]
async fn create_write_close_round_trip_uses_two_step_dance() {
    let (state, addr) = spawn_mock().await;
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));

    client.create("/x", 0o600, Some("tester")).await.unwrap();
    let written = client.put("/x", Bytes::from_static(b"HELLO"), None, Some("tester")).await.unwrap();
    assert_eq!(written, 5);

    let st = state.lock().unwrap();
    let create_req = st
        .log
        .iter()
        .find(|r| r.method == "PUT" && r.path == "/x" && r.query.get("op").map(String::as_str) == Some("CREATE") && !r.query.contains_key("overwrite"))
        .expect("namenode should have seen the plain CREATE from create()");
    assert_eq!(create_req.query.get("permission").unwrap(), "600");
    assert_eq!(create_req.query.get("user.name").unwrap(), "tester");

    let overwrite_req = st
        .log
        .iter()
        .find(|r| r.method == "PUT" && r.path == "/x" && r.query.get("overwrite").map(String::as_str) == Some("true"))
        .expect("namenode should have seen the overwrite CREATE from put()");
    assert_eq!(overwrite_req.query.get("op").unwrap(), "CREATE");

    let data_req = st
        .log
        .iter()
        .find(|r| r.method == "PUT" && r.query.get("op").map(String::as_str) == Some("CREATE_DATA"))
        .expect("datanode should have received the raw payload PUT");
    assert_eq!(data_req.path, "/x");

    assert_eq!(st.files.get("/x").unwrap().content, b"HELLO");
}

#[tokio::test]
async fn truncate_without_prior_open_leaves_no_cache_entry() {
    let (state, addr) = spawn_mock().await;
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    client.create("/x", 0o644, Some("tester")).await.unwrap();
    client.put("/x", Bytes::from_static(b"HELLO WORLD"), None, Some("tester")).await.unwrap();

    let mut cache = StagingCache::new("test-").unwrap();
    assert!(!cache.contains("/x"));
    cache.open_entry("/x").unwrap();
    cache.refresh(&client, "/x", Some("tester")).await.unwrap();
    cache.truncate("/x", 0).unwrap();
    cache.push_if_dirty(&client, "/x", None, Some("tester")).await.unwrap();
    cache.remove("/x").unwrap();

    assert!(!cache.contains("/x"));
    assert_eq!(state.lock().unwrap().files.get("/x").unwrap().content.len(), 0);
}

#[tokio::test]
async fn rename_over_non_empty_directory_reports_directory_not_empty() {
    let (state, addr) = spawn_mock().await;
    {
        let mut st = state.lock().unwrap();
        st.files.insert("/new".to_string(), MockFile::dir(0o755));
        st.files.insert("/new/child".to_string(), MockFile::dir(0o755));
    }
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    assert!(client.getattr("/new", Some("tester")).await.is_ok());
    let err = client.delete("/new", false, Some("tester")).await.unwrap_err();
    assert!(matches!(err, RemoteError::DirectoryNotEmpty));
}

#[tokio::test]
async fn checksum_refresh_is_idempotent_when_remote_is_unchanged() {
    let (state, addr) = spawn_mock().await;
    {
        let mut st = state.lock().unwrap();
        st.files.insert(
            "/x".to_string(),
            MockFile {
                kind: MockKind::File,
                perm: 0o644,
                owner: "tester".to_string(),
                group: "tester".to_string(),
                content: b"DATA".to_vec(),
                atime_ms: 0,
                mtime_ms: 0,
                version: 1,
            },
        );
    }
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    let mut cache = StagingCache::new("test-").unwrap();
    cache.open_entry("/x").unwrap();
    cache.refresh(&client, "/x", Some("tester")).await.unwrap();
    assert!(!cache.is_dirty("/x"));
    cache.refresh(&client, "/x", Some("tester")).await.unwrap();
    assert!(!cache.is_dirty("/x"));
    let data = cache.read_at("/x", 0, 4).unwrap();
    assert_eq!(data, b"DATA");
}

#[tokio::test]
async fn server_wins_when_remote_content_changes_under_a_dirty_entry() {
    let (state, addr) = spawn_mock().await;
    {
        let mut st = state.lock().unwrap();
        st.files.insert(
            "/x".to_string(),
            MockFile {
                kind: MockKind::File,
                perm: 0o644,
                owner: "tester".to_string(),
                group: "tester".to_string(),
                content: b"OLD".to_vec(),
                atime_ms: 0,
                mtime_ms: 0,
                version: 1,
            },
        );
    }
    let client = RemoteClient::new(format!("http://{addr}/webhdfs/v1/"));
    let mut cache = StagingCache::new("test-").unwrap();
    cache.open_entry("/x").unwrap();
    cache.refresh(&client, "/x", Some("tester")).await.unwrap();
    cache.write_at("/x", 0, b"LOCAL-DIRTY-BYTES").unwrap();
    assert!(cache.is_dirty("/x"));

    {
        let mut st = state.lock().unwrap();
        let f = st.files.get_mut("/x").unwrap();
        f.content = b"NEW-FROM-SERVER".to_vec();
        f.version += 1;
    }

    cache.refresh(&client, "/x", Some("tester")).await.unwrap();
    assert!(!cache.is_dirty("/x"));
    cache.push_if_dirty(&client, "/x", None, Some("tester")).await.unwrap();

    let puts_after_server_change = state
        .lock()
        .unwrap()
        .log
        .iter()
        .filter(|r| r.query.get("op").map(String::as_str) == Some("CREATE_DATA"))
        .count();
    assert_eq!(puts_after_server_change, 0, "server-wins must drop the local dirty write, issuing no put");
}

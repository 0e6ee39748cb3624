mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestServer, CONTEXT_BUCKET};

#[tokio::test]
async fn upload_list_read_and_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token();
    server.objects.insert(CONTEXT_BUCKET, "regulamento.txt", "Regulamento da feira").await;

    let res = server
        .client
        .post(server.url("/api/admin/contexts"))
        .bearer_auth(&admin)
        .json(&json!({ "name": "guia.txt", "content": "Guia do participante" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "guia.txt");
    assert_eq!(body["data"]["size"], 20);
    assert_eq!(
        server.objects.content_type(CONTEXT_BUCKET, "guia.txt").await.as_deref(),
        Some("text/plain; charset=utf-8")
    );

    let res = server
        .client
        .get(server.url("/api/admin/contexts"))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let names: Vec<&str> = body["data"]
        .as_array()
        .expect("listing is an array")
        .iter()
        .filter_map(|o| o["name"].as_str())
        .collect();
    assert_eq!(names, vec!["guia.txt", "regulamento.txt"]);

    let res = server
        .client
        .get(server.url("/api/admin/contexts/regulamento.txt"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["content"], "Regulamento da feira");
    assert_eq!(body["data"]["characters"], 20);

    let res = server
        .client
        .delete(server.url("/api/admin/contexts/guia.txt"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .get(server.url("/api/admin/contexts/guia.txt"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn reload_loads_every_text_file() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.objects.insert(CONTEXT_BUCKET, "a.txt", "primeiro").await;
    server.objects.insert(CONTEXT_BUCKET, "b.txt", "segundo").await;
    server.objects.insert(CONTEXT_BUCKET, "capa.pdf", "%PDF-1.4").await;

    let res = server
        .client
        .post(server.url("/api/admin/contexts/reload"))
        .bearer_auth(server.admin_token())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["loaded_files"], 2);
    assert_eq!(body["data"]["cache"]["keys"], json!(["all"]));
    Ok(())
}

#[tokio::test]
async fn invalid_names_are_refused() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server
        .client
        .post(server.url("/api/admin/contexts"))
        .bearer_auth(server.admin_token())
        .json(&json!({ "name": "notas.md", "content": "texto" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn context_check_reports_connection() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.objects.insert(CONTEXT_BUCKET, "resumos.txt", "Resumos").await;

    let res = server
        .client
        .get(server.url("/api/assistant/contexts/check"))
        .bearer_auth(server.participant_token())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    let check = &body["data"];
    assert_eq!(check["bucket"], CONTEXT_BUCKET);
    assert_eq!(check["connected"], true);
    assert_eq!(check["object_count"], 1);
    assert_eq!(check["loaded_files"], 1);
    assert!(check["connection_error"].is_null());
    Ok(())
}

#[tokio::test]
async fn unreachable_store_is_reported_not_raised() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.objects.set_unavailable(true);

    let res = server
        .client
        .get(server.url("/api/assistant/contexts/check"))
        .bearer_auth(server.participant_token())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["connected"], false);
    assert!(body["data"]["connection_error"].is_string());
    assert!(body["data"]["load_error"].is_string());

    let res = server
        .client
        .get(server.url("/api/admin/contexts"))
        .bearer_auth(server.admin_token())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    Ok(())
}

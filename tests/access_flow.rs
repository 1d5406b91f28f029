//! End-to-end flows against a spawned dropoffd and a stand-in provider.

mod common;

use common::idp::K2_PEM;
use common::{Idp, TestServer};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_granted_subject_reaches_its_point() -> anyhow::Result<()> {
    let idp = Idp::spawn().await?;
    let server = TestServer::spawn(&idp.issuer).await?;
    let client = reqwest::Client::new();

    let resp = client
        .get(server.url("/access"))
        .bearer_auth(idp.token("abc"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["name"], "Fidalgo");
    assert_eq!(body["point_id"], 3);
    assert_eq!(body["point"]["name"], "DETI");

    let resp = client
        .get(server.url("/access"))
        .bearer_auth(idp.token("someone-else"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_point_lifecycle() -> anyhow::Result<()> {
    let idp = Idp::spawn().await?;
    let server = TestServer::spawn(&idp.issuer).await?;
    let client = reqwest::Client::new();
    let token = idp.token("abc");

    let points: Vec<Value> = client.get(server.url("/points")).send().await?.json().await?;
    assert_eq!(points.len(), 6);

    let new_point = json!({
        "name": "Cantina",
        "location": "Campus Santiago",
        "coordinates": "40.6305, -8.6590",
    });

    let resp = client.post(server.url("/points")).json(&new_point).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(server.url("/points"))
        .bearer_auth(&token)
        .json(&new_point)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await?;
    let id = created["id"].as_i64().unwrap_or_default();
    assert!(created["image"].is_null());

    let fetched: Value = client
        .get(server.url(&format!("/points/{id}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(fetched, created);

    let resp = client
        .delete(server.url("/point/Cantina"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(server.url(&format!("/points/{id}"))).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_rejections_do_not_leak_reasons() -> anyhow::Result<()> {
    let idp = Idp::spawn().await?;
    let server = TestServer::spawn(&idp.issuer).await?;
    let client = reqwest::Client::new();

    let expired = idp.mint("k1", common::idp::K1_PEM, &idp.claims("abc", -3600));
    let unpublished = idp.mint("k2", K2_PEM, &idp.claims("abc", 3600));
    let mut wrong_aud = idp.claims("abc", 3600);
    wrong_aud["aud"] = json!("other-app");
    let wrong_aud = idp.mint("k1", common::idp::K1_PEM, &wrong_aud);

    let mut bodies = Vec::new();
    for token in [expired, unpublished, wrong_aud, "not.a.jwt".to_string()] {
        let resp = client
            .get(server.url("/access"))
            .bearer_auth(&token)
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        bodies.push(resp.json::<Value>().await?);
    }
    for body in &bodies {
        assert_eq!(body, &json!({ "detail": "ERROR: Invalid Access token" }));
    }

    let resp = client.get(server.url("/access")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body["detail"], "ERROR: Authorization header missing");
    Ok(())
}

#[tokio::test]
async fn test_granted_point_cannot_be_deleted() -> anyhow::Result<()> {
    let idp = Idp::spawn().await?;
    let server = TestServer::spawn(&idp.issuer).await?;
    let client = reqwest::Client::new();

    let resp = client
        .delete(server.url("/point/DETI"))
        .bearer_auth(idp.token("abc"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client.get(server.url("/points/3")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_cached_keys_survive_provider_outage() -> anyhow::Result<()> {
    let idp = Idp::spawn().await?;
    let server = TestServer::spawn(&idp.issuer).await?;
    let client = reqwest::Client::new();

    // Warm-up at startup already loaded k1.
    idp.take_down();

    let resp = client
        .get(server.url("/access"))
        .bearer_auth(idp.token("abc"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

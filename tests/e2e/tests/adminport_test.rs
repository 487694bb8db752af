//! Admin port driven over a live HTTP listener.

use cascade_e2e_tests::{sample_mutation, AdminFixture};

use std::time::Duration;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

async fn create_replication(
    client: &reqwest::Client,
    node: &AdminFixture,
    body: &str,
) -> anyhow::Result<String> {
    let response = client
        .post(node.url("/controller/createReplication"))
        .header("Content-Type", FORM_CONTENT_TYPE)
        .body(body.to_string())
        .send()
        .await?;
    anyhow::ensure!(response.status().is_success(), "create failed");
    let body = response.text().await?;
    Ok(body.trim_start_matches("id=").to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn replication_lifecycle_over_http() -> anyhow::Result<()> {
    let node = AdminFixture::spawn(Duration::from_millis(50))?;
    let client = reqwest::Client::new();

    let id = create_replication(
        &client,
        &node,
        "fromBucket=beer-sample&uuid=cluster-b&toBucket=beer-backup&forward=false",
    )
    .await?;

    // The data plane feeds the source stage directly.
    for i in 0..4 {
        node.manager
            .feed(&id, sample_mutation(&format!("doc-{i}"), b"payload"))
            .await?;
    }

    // Pause over HTTP; this drains the pipeline before returning.
    let response = client
        .post(node.url(&format!("/controller/pauseReplication/{id}")))
        .header("Content-Type", FORM_CONTENT_TYPE)
        .body("forward=false")
        .send()
        .await?;
    assert!(response.status().is_success());

    let stats: serde_json::Value = client
        .get(node.url("/stats"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats[&id]["docs_written"], 4);
    assert_eq!(stats[&id]["docs_received"], 4);
    assert_eq!(stats[&id]["changes_left"], 0);
    assert_eq!(stats[&id]["active"], false);

    // Resume and confirm the pipeline accepts data again.
    let response = client
        .post(node.url(&format!("/controller/resumeReplication/{id}")))
        .header("Content-Type", FORM_CONTENT_TYPE)
        .body("forward=false")
        .send()
        .await?;
    assert!(response.status().is_success());
    node.manager.feed(&id, sample_mutation("doc-x", b"p")).await?;

    // Delete tears the pipeline down.
    let response = client
        .delete(node.url(&format!("/controller/cancelReplication/{id}")))
        .send()
        .await?;
    assert!(response.status().is_success());
    let stats: serde_json::Value = client
        .get(node.url("/stats"))
        .send()
        .await?
        .json()
        .await?;
    assert!(stats.as_object().unwrap().is_empty());

    node.manager.shutdown().await?;
    node.server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn settings_change_over_http_pauses_the_pipeline() -> anyhow::Result<()> {
    let node = AdminFixture::spawn(Duration::from_millis(50))?;
    let client = reqwest::Client::new();

    let id = create_replication(
        &client,
        &node,
        "fromBucket=b1&uuid=c2&toBucket=b2&forward=false",
    )
    .await?;

    let response = client
        .post(node.url(&format!("/settings/replications/{id}")))
        .header("Content-Type", FORM_CONTENT_TYPE)
        .body("active=false&checkpointInterval=120")
        .send()
        .await?;
    assert!(response.status().is_success());

    let body = client
        .get(node.url(&format!("/settings/replications/{id}")))
        .send()
        .await?
        .text()
        .await?;
    assert!(body.contains("checkpointInterval=120"));
    assert!(body.contains("active=false"));

    assert!(node.manager.feed(&id, sample_mutation("d", b"x")).await.is_err());

    node.manager.shutdown().await?;
    node.server.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn create_is_forwarded_to_peer_nodes() -> anyhow::Result<()> {
    let node_a = AdminFixture::spawn(Duration::from_millis(50))?;
    let node_b = AdminFixture::spawn(Duration::from_millis(50))?;
    node_a
        .forwarder
        .set_peers(vec![node_b.addr.to_string()]);

    let client = reqwest::Client::new();
    create_replication(
        &client,
        &node_a,
        "fromBucket=beer-sample&uuid=cluster-b&toBucket=beer-backup",
    )
    .await?;

    // The peer applies the forwarded create with forward pinned to false.
    let deadline = Duration::from_secs(5);
    let started = std::time::Instant::now();
    loop {
        let stats: serde_json::Value = client
            .get(node_b.url("/stats"))
            .send()
            .await?
            .json()
            .await?;
        if stats.as_object().map(|m| m.len()) == Some(1) {
            break;
        }
        anyhow::ensure!(
            started.elapsed() < deadline,
            "forwarded create never reached the peer"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    node_a.manager.shutdown().await?;
    node_b.manager.shutdown().await?;
    node_a.server.abort();
    node_b.server.abort();
    Ok(())
}

//! Firestore integration tests.
//!
//! Run against a project (`GCP_PROJECT_ID` plus credentials) or the
//! emulator (`FIRESTORE_EMULATOR_HOST`).

use reel_firestore::{FirestoreClient, FirestoreConfig, JobRepository};
use reel_models::{BatchOutput, JobId, JobRecord, JobStatus};

async fn repository() -> JobRepository {
    dotenvy::dotenv().ok();
    let config = FirestoreConfig::from_env().expect("Firestore config");
    let client = FirestoreClient::new(config)
        .await
        .expect("Failed to create Firestore client");
    JobRepository::new(client)
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_missing_job_reads_as_none() {
    let repo = repository().await;
    let job = repo.get(&JobId::new()).await.expect("Failed to read");
    assert!(job.is_none());
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_job_lifecycle() {
    let repo = repository().await;
    let job_id = JobId::new();
    repo.create(&JobRecord::new(job_id.clone()))
        .await
        .expect("Failed to create job");

    repo.set_batch_count(&job_id, 2).await.unwrap();
    repo.append_output(&job_id, &BatchOutput::new(2, "https://cdn/video2.mp4"))
        .await
        .unwrap();
    repo.append_output(&job_id, &BatchOutput::new(1, "https://cdn/video1.mp4"))
        .await
        .unwrap();
    // Identical element: the transform leaves the array unchanged
    repo.append_output(&job_id, &BatchOutput::new(1, "https://cdn/video1.mp4"))
        .await
        .unwrap();

    let stored = repo.get(&job_id).await.unwrap().expect("job exists");
    assert_eq!(stored.record.batches.as_ref().unwrap().outputs.len(), 2);
    assert!(stored.record.ready_to_join());

    assert!(repo.claim_join(&job_id, 2).await.unwrap());
    assert!(!repo.claim_join(&job_id, 1).await.unwrap());
    // A redelivery of the owning batch keeps the claim
    assert!(repo.claim_join(&job_id, 2).await.unwrap());
    assert_eq!(repo.get(&job_id).await.unwrap().unwrap().record.joiner, Some(2));

    repo.set_status(&job_id, JobStatus::Processed, Some("https://cdn/video.mp4"))
        .await
        .unwrap();
    let stored = repo.get(&job_id).await.unwrap().unwrap();
    assert_eq!(stored.record.status, JobStatus::Processed);
    assert_eq!(stored.record.video.as_deref(), Some("https://cdn/video.mp4"));
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_concurrent_appends_are_not_lost() {
    let repo = repository().await;
    let job_id = JobId::new();
    repo.create(&JobRecord::new(job_id.clone())).await.unwrap();
    repo.set_batch_count(&job_id, 8).await.unwrap();

    let tasks: Vec<_> = (1..=8)
        .map(|n| {
            let repo = repo.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                repo.append_output(&job_id, &BatchOutput::new(n, format!("https://cdn/video{}.mp4", n)))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let record = repo.get(&job_id).await.unwrap().unwrap().record;
    assert_eq!(record.received_batches().len(), 8);
    let order: Vec<u32> = record.ordered_outputs().iter().map(|o| o.batch).collect();
    assert_eq!(order, (1..=8).collect::<Vec<_>>());
}

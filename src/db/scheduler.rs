use super::DBClient;
use mongodb::bson::{DateTime, doc};
use tokio_cron_scheduler::{Job, JobScheduler};

impl DBClient {
    /// Daily job (01:00) removing signups that never redeemed their
    /// verification token before it expired.
    pub async fn start_cleanup_task(&self) {
        let sched = JobScheduler::new().await.unwrap();
        let db_client = self.clone();

        let job = Job::new_async("0 0 1 * * *", move |uuid, _l| {
            let db_client = db_client.clone();
            Box::pin(async move {
                println!("Running cleanup job {:?}", uuid);

                let result = db_client
                    .users()
                    .delete_many(doc! {
                        "verified": false,
                        "tokenExpiresAt": { "$lt": DateTime::now() },
                    })
                    .await;

                match result {
                    Ok(r) => {
                        println!(
                            "Cleanup job {:?} finished successfully, deleted {} users",
                            uuid, r.deleted_count
                        );
                    }
                    Err(e) => {
                        eprintln!("Cleanup job {:?} failed: {:?}", uuid, e);
                    }
                }
            })
        })
        .unwrap();

        sched.add(job).await.unwrap();
        //It doesn't block.
        sched.start().await.unwrap();
    }
}

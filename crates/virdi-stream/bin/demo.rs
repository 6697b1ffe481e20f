//! In-process demo: one producer and one consumer wired to a small engine
//! over channels, standing in for a transport adapter.
//!
//! Run with: cargo run --bin demo

use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use virdi_engine::{Engine, Resource};
use virdi_stream::{
    consume, produce, ConsumptionRequest, NullObserver, ProductionFrame, StreamMeta,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let engine = Arc::new(Engine::new([Resource::new("iron", 100)]));

    // Producer: init frame plus a burst of deliveries.
    let producer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let meta = StreamMeta::with_client_id("demo-producer");
            let mut frames = vec![ProductionFrame::Init {
                resource_id: "iron".to_string(),
            }];
            frames.extend(std::iter::repeat(ProductionFrame::Amount(10)).take(12));
            produce(&engine, &meta, futures::stream::iter(frames), &NullObserver).await
        })
    };

    // Consumer: a fast client with a small buffer, fed over a channel.
    let (deliveries_tx, mut deliveries_rx) = mpsc::channel(8);
    let consumer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let meta = StreamMeta::with_client_id("demo-consumer");
            let request = ConsumptionRequest {
                consumer_id: "demo".to_string(),
                resource_id: "iron".to_string(),
                max_rate: 1_200,
                buffer_limit: Some(40),
                current_buffer_amount: None,
            };
            consume(&engine, &meta, request, deliveries_tx).await
        })
    };

    match producer.await.expect("producer task") {
        Ok(_) => println!("producer: stream ran dry"),
        Err(error) => println!("producer: stopped ({error})"),
    }

    let mut received = 0u64;
    while received < 60 {
        let Ok(Some(frame)) =
            tokio::time::timeout(Duration::from_secs(10), deliveries_rx.next()).await
        else {
            break;
        };
        received += frame.amount;
        println!("consumer: received {} (total {received})", frame.amount);
    }

    consumer.abort();
    let _ = consumer.await;

    let resource = engine.resource("iron").expect("iron resource");
    println!(
        "global buffer at shutdown: {}/{}",
        resource.buffer().amount().await,
        resource.buffer().limit()
    );
}

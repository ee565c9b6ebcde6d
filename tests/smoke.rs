//! Cross-crate smoke checks through the facade.

use rand::RngCore;
use uuid::Uuid;
use voxgate::prelude::*;

#[test]
fn codec_stack_round_trips_random_payloads() {
    let mut rng = rand::thread_rng();

    for compression in [
        CompressionKind::None,
        CompressionKind::Brotli,
        CompressionKind::GZip,
        CompressionKind::Deflate,
        CompressionKind::Lz4,
    ] {
        for encryption in [
            EncryptionKind::None,
            EncryptionKind::Aes256,
            EncryptionKind::ChaCha20Poly1305,
        ] {
            let processor = PacketProcessor::new(CodecConfig {
                compression,
                encryption,
                key: EncryptionKey::generate(encryption),
            });

            for len in [0usize, 1, 4096, 1024 * 1024] {
                let mut data = vec![0u8; len];
                rng.fill_bytes(&mut data);

                let message: Message = voxgate::protocol::messages::AssetResponse {
                    request_id: Uuid::new_v4(),
                    name: "blob".into(),
                    data,
                }
                .into();

                let bytes = processor.serialize_to_bytes(&message).unwrap();

                let mut dec = voxgate::protocol::FrameDecoder::new();
                dec.queue_slice(&bytes);
                let frame = dec.try_next_frame().unwrap().unwrap();

                assert_eq!(
                    processor.deserialize(&frame).unwrap(),
                    message,
                    "{compression:?}/{encryption:?} at {len} bytes"
                );
            }
        }
    }
}

#[tokio::test]
async fn chunks_regenerate_identically_after_eviction() {
    let origin = glam::IVec3::new(-32, 0, 16);

    let pipeline = GenerationPipeline::with_default_steps(20260801);
    let cache = ChunkCache::new(
        pipeline,
        CacheConfig { ttl: std::time::Duration::ZERO, ..CacheConfig::default() },
    );

    let first = cache.get(origin).await.unwrap().read().kind_bytes();

    assert_eq!(cache.evict_expired(), 1);

    let second = cache.get(origin).await.unwrap().read().kind_bytes();
    assert_eq!(first, second, "determinism is what makes eviction safe");
}

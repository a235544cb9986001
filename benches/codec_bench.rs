#![allow(clippy::unwrap_used, clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use membership_protocol::core::abi::AbiPackage;
use membership_protocol::core::primitives::{Address, U256};
use membership_protocol::protocol::message::UpdateGroupMemberSynPackage;
use membership_protocol::protocol::package::{
    CrossChainPackage, PackageType, OPERATION_ADD_GROUP_MEMBER, OPERATION_UPDATE_GROUP_MEMBER,
};
use membership_protocol::protocol::schemas::{register_group_schemas_v1, register_group_schemas_v2};
use membership_protocol::protocol::PackageDispatcher;

const CHANNEL: u8 = 6;

fn update_package(members: usize) -> UpdateGroupMemberSynPackage {
    UpdateGroupMemberSynPackage {
        operator: Address::new([1u8; 20]),
        group_id: U256::from(42u64),
        operation_type: OPERATION_ADD_GROUP_MEMBER,
        members: (0..members)
            .map(|i| Address::new([(i % 250) as u8 + 2; 20]))
            .collect(),
        extra_data: vec![0xAB; 64],
        member_expiration: (0..members as u64).map(|i| 1_700_000_000 + i).collect(),
    }
}

fn bench_update_member_abi(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_member_abi");

    for &members in &[1usize, 20, 200] {
        let package = update_package(members);
        let encoded = package.encode_abi();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_function(format!("encode_{}_members", members), |b| {
            b.iter_batched(
                || package.clone(),
                |p| {
                    let _ = p.encode_abi();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{}_members", members), |b| {
            b.iter(|| {
                let decoded = UpdateGroupMemberSynPackage::decode_abi(&encoded).unwrap();
                assert_eq!(decoded.members.len(), members);
            })
        });
    }

    group.finish();
}

fn bench_dispatcher_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher_route");
    let dispatcher = PackageDispatcher::default();
    register_group_schemas_v1(&dispatcher, CHANNEL).unwrap();
    register_group_schemas_v2(&dispatcher, CHANNEL).unwrap();

    let raw = CrossChainPackage::new(OPERATION_UPDATE_GROUP_MEMBER, update_package(20).encode_abi())
        .serialize();
    let syn = PackageType::Syn as u8;

    group.bench_function("route_latest", |b| {
        b.iter(|| {
            let payload = dispatcher.route(CHANNEL, &raw, syn);
            assert!(payload.is_ok());
        })
    });

    let garbage = vec![OPERATION_UPDATE_GROUP_MEMBER, 0xFF, 0x00, 0x13];
    group.bench_function("route_rejects_garbage", |b| {
        b.iter(|| {
            let payload = dispatcher.route(CHANNEL, &garbage, syn);
            assert!(payload.is_err());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_update_member_abi, bench_dispatcher_route);
criterion_main!(benches);

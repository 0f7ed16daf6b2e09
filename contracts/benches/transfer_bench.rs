// Transfer engine benchmarks for the Levy token.
//
// Covers fee computation, plain and delegated taxed transfers, and
// conservation checks over ledgers of increasing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use levy_contracts::{FeeVariant, TaxedToken, TokenConfig};
use levy_protocol::{Address, Amount};

fn addr(n: u32) -> Address {
    let mut bytes = [0u8; 20];
    bytes[16..].copy_from_slice(&n.to_be_bytes());
    Address::new(bytes)
}

/// Sets up a token with `holders` funded accounts (ids 100..100+holders).
fn setup_token(variant: FeeVariant, holders: u32) -> TaxedToken {
    let owner = addr(1);
    let config = TokenConfig {
        name: "Levy".into(),
        symbol: "LVY".into(),
        treasury: addr(2),
        fee_rate: Amount::from(2u64),
        variant,
    };
    let mut token = TaxedToken::new(config, owner).unwrap();
    for i in 0..holders {
        token
            .transfer(&owner, &addr(100 + i), Amount::exp10(20))
            .unwrap();
    }
    token
}

fn bench_calculate_tax(c: &mut Criterion) {
    let token = setup_token(FeeVariant::ExemptionChecked, 0);
    let amount = Amount::from(1_000_000u64);

    c.bench_function("fee/calculate_tax", |b| {
        b.iter(|| token.calculate_tax(amount).unwrap());
    });
}

fn bench_taxed_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer/taxed");

    for variant in [FeeVariant::Unconditional, FeeVariant::ExemptionChecked] {
        group.bench_with_input(
            BenchmarkId::from_parameter(variant),
            &variant,
            |b, &variant| {
                let mut token = setup_token(variant, 2);
                // Ping-pong so balances never run dry.
                let mut flip = false;
                b.iter(|| {
                    let (from, to) = if flip { (101, 100) } else { (100, 101) };
                    flip = !flip;
                    token
                        .transfer(&addr(from), &addr(to), Amount::from(1_000u64))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_transfer_from(c: &mut Criterion) {
    let mut token = setup_token(FeeVariant::ExemptionChecked, 2);
    let spender = addr(3);
    token.approve(&addr(100), &spender, Amount::MAX).unwrap();

    c.bench_function("transfer/delegated", |b| {
        b.iter(|| {
            token
                .transfer_from(&spender, &addr(100), &addr(101), Amount::one())
                .unwrap()
        });
    });
}

fn bench_conservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/conservation");

    for holders in [10u32, 100, 1_000] {
        let token = setup_token(FeeVariant::ExemptionChecked, holders);
        group.throughput(Throughput::Elements(holders as u64));
        group.bench_with_input(BenchmarkId::from_parameter(holders), &token, |b, token| {
            b.iter(|| token.conservation_holds());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_calculate_tax,
    bench_taxed_transfer,
    bench_transfer_from,
    bench_conservation,
);
criterion_main!(benches);

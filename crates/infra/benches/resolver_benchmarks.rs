use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use permgate_auth::{
    Actor, Catalog, CatalogDefinition, Change, ChangeTarget, DataPermissionGrant, ModuleGrant,
    ModulePermissionGrant, Permission, PermissionGroup, PermissionResolver, ProvisioningConfig,
    ProvisioningLookup, Role, RoleDefaults, Subject, UserGrants,
};
use permgate_core::{AccessResult, CompanyId, FixedClock, ModuleId, PermissionKey, UserId};
use permgate_infra::{EngineConfig, InMemoryAccessService};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Every module is provisioned for every company.
struct AllProvisioned;

impl ProvisioningLookup for AllProvisioned {
    fn is_active(&self, _company_id: CompanyId, _module: &ModuleId) -> AccessResult<bool> {
        Ok(true)
    }
}

/// A user with every module enabled, every sub-feature on and a few overrides.
fn populated_grants(catalog: &Catalog, user_id: UserId, company_id: CompanyId) -> UserGrants {
    let now = Utc::now();
    let admin = UserId::new();
    let mut grants = UserGrants::default();

    for module in catalog.modules() {
        grants.modules.push(ModuleGrant {
            user_id,
            company_id,
            module_id: module.id.clone(),
            is_enabled: true,
            granted_by: admin,
            granted_at: now,
            expires_at: None,
        });
        for feature in &module.optional_sub_features {
            grants.module_permissions.push(ModulePermissionGrant {
                user_id,
                company_id,
                module_id: module.id.clone(),
                key: feature.key.clone(),
                is_granted: true,
                granted_by: admin,
                granted_at: now,
                expires_at: None,
            });
        }
    }
    for (key, granted) in [("reports.view", true), ("users.view", true), ("dashboard.view", false)] {
        grants.data.push(DataPermissionGrant {
            user_id,
            company_id,
            key: PermissionKey::from(key),
            is_granted: granted,
            granted_by: admin,
            granted_at: now,
            expires_at: None,
        });
    }
    grants
}

/// `size` foundation permissions, each requiring the previous one.
fn chained_catalog(size: usize) -> Catalog {
    let permissions = (0..size)
        .map(|i| Permission {
            key: PermissionKey::from(format!("chain.{i}")),
            name: format!("Chain {i}"),
            group: PermissionGroup::Settings,
            requires_permissions: if i == 0 {
                BTreeSet::new()
            } else {
                BTreeSet::from([PermissionKey::from(format!("chain.{}", i - 1))])
            },
            is_foundation: true,
            is_system_only: false,
        })
        .collect();

    Catalog::from_definition(CatalogDefinition {
        permissions,
        role_defaults: RoleDefaults::new(),
        ..Default::default()
    })
    .expect("chained catalog is valid")
}

fn bench_resolve_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_latency");
    group.sample_size(1000);

    let catalog = Catalog::default_catalog().expect("default catalog");
    let company_id = CompanyId::new();
    let user_id = UserId::new();
    let grants = populated_grants(&catalog, user_id, company_id);
    let now = Utc::now();

    for role in Role::ALL {
        group.bench_with_input(BenchmarkId::new("default_catalog", role), &role, |b, role| {
            let resolver = PermissionResolver::new(&catalog);
            b.iter(|| {
                let set = resolver
                    .resolve(user_id, company_id, *role, &grants, &AllProvisioned, now)
                    .unwrap();
                black_box(set);
            });
        });
    }

    group.bench_function("no_grants", |b| {
        let resolver = PermissionResolver::new(&catalog);
        let empty = UserGrants::default();
        b.iter(|| {
            let set = resolver
                .resolve(user_id, company_id, Role::User, &empty, &AllProvisioned, now)
                .unwrap();
            black_box(set);
        });
    });

    group.finish();
}

fn bench_resolve_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_scaling");

    for size in [10usize, 100, 1_000].iter() {
        let catalog = chained_catalog(*size);
        let company_id = CompanyId::new();
        let user_id = UserId::new();
        let now = Utc::now();
        let grants = UserGrants {
            data: (0..*size)
                .map(|i| DataPermissionGrant {
                    user_id,
                    company_id,
                    key: PermissionKey::from(format!("chain.{i}")),
                    is_granted: true,
                    granted_by: user_id,
                    granted_at: now,
                    expires_at: None,
                })
                .collect(),
            ..Default::default()
        };

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("dependency_chain", size), size, |b, _| {
            let resolver = PermissionResolver::new(&catalog);
            b.iter(|| {
                let set = resolver
                    .resolve(user_id, company_id, Role::User, &grants, &AllProvisioned, now)
                    .unwrap();
                black_box(set);
            });
        });
    }

    group.finish();
}

fn bench_commit_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_throughput");

    let keys = ["reports.view", "users.view", "settings.view", "dashboard.view"];
    for batch_size in [1usize, 4, 16].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("data_toggles", batch_size),
            batch_size,
            |b, &batch_size| {
                let service = InMemoryAccessService::in_memory(
                    EngineConfig::default(),
                    Arc::new(FixedClock::new(Utc::now())),
                )
                .unwrap();
                let company_id = CompanyId::new();
                let admin = Actor::new(UserId::new(), company_id, Role::Admin);
                let subject = Subject::new(UserId::new(), company_id, Role::User);
                service
                    .provision_module(&admin, company_id, &ModuleId::from("expenses-pro"), ProvisioningConfig::default())
                    .unwrap();

                let mut desired = true;
                b.iter(|| {
                    desired = !desired;
                    let changes = (0..batch_size)
                        .map(|i| {
                            let target = ChangeTarget::data(keys[i % keys.len()]);
                            if desired {
                                Change::grant(target)
                            } else {
                                Change::revoke(target)
                            }
                        })
                        .collect();
                    black_box(service.propose_and_commit(&admin, &subject, changes).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_latency,
    bench_resolve_scaling,
    bench_commit_throughput
);
criterion_main!(benches);

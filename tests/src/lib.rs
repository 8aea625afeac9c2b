// ============ Avvy Test Suite ============
// Cross-crate tests for the commit-reveal orchestrators
//
// Test categories:
// 1. Integration: full registration and auction lifecycles, restart recovery
// 2. Adversarial: tampered bundles, declined wallets, failed transactions,
//    wrong phases, duplicate submissions, bad proofs
// 3. Fuzz/Property: random inputs with invariant checks

#[cfg(test)]
mod common;

#[cfg(test)]
mod integration;

#[cfg(test)]
mod adversarial;

//! End-to-end tests for the Genesis operator
//!
//! These tests require a Kubernetes cluster reachable through the current
//! kubeconfig. They are ignored by default and can be run with:
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod kind_tests;

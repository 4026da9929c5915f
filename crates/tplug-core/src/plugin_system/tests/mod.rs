
pub mod info_tests;
pub mod lifecycle_tests;
pub mod registry_tests;

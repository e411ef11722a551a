/*!
 * Main test entry point for codedtext test suite
 */

// Test names follow test_thing_action_shouldX
#![allow(non_snake_case)]

// Import common test utilities
pub mod common;

// Import unit tests
mod unit {
    // Fragment mutation tests
    pub mod fragment_tests;

    // Renderer and XLIFF writer tests
    pub mod render_tests;

    // XLIFF reader tests
    pub mod xliff_tests;

    // Unit, part and note tests
    pub mod unit_tests;

    // App configuration tests
    pub mod app_config_tests;

    // Language utilities tests
    pub mod language_utils_tests;
}

// Import integration tests
mod integration {
    // Batch checking of documents
    pub mod batch_workflow_tests;

    // Controller check and render flows
    pub mod controller_tests;
}

mod application_tests;
mod guard_tests;
mod health_tests;
mod oauth_flow_tests;

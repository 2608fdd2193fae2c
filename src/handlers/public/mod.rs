// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition endpoints. Everything here must validate its own input
// since there is no trusted user context.
//
// Security Level: None
// Route Prefix: /auth/*
// Middleware: None

pub mod auth;

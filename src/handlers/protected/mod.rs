// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware → validate_user_middleware

pub mod auth;         // Session endpoints for the logged-in user
pub mod cases;        // Case files, documents and timeline
pub mod clients;      // Client records
pub mod invoices;     // Billing and payments
pub mod messages;     // User-to-user messages
pub mod notices;      // Firm-wide notices
pub mod time_entries; // Billable hours
pub mod users;        // User administration

/*
PROTECTED HANDLER ARCHITECTURE:

Middleware Stack Applied to All Protected Routes:
```rust
Router::new()
    .route("/api/cases", get(protected::cases::list))
    .layer(from_fn_with_state(state, validate_user_middleware)) // Reloads the user
    .layer(from_fn(jwt_auth_middleware))                        // Validates JWT token
```

Handler Context:
- **AuthUser** (request extension): id, email and role from the token
- **CurrentUser** (request extension): the stored user, reloaded per request
- **AppState** (router state): document store + sequence allocator

Access rules:
- Role gates (`require_staff`, `require_admin`) are checked in the handler.
- Row-level scoping (assigned lawyer, linked client) is applied by services.
*/

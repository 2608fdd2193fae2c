// handlers/mod.rs - Two-tier handler architecture
//
// Public (no auth) → Protected (JWT auth + user re-validation)
//
pub mod public;    // Tier 1: No authentication required (/auth/*)
pub mod protected; // Tier 2: JWT authentication required (/api/*)

/*
HANDLER LAYOUT:

src/
├── handlers/
│   ├── mod.rs              ← This file
│   ├── public/
│   │   └── auth/           ← POST /auth/login, POST /auth/register
│   └── protected/
│       ├── auth.rs         ← /api/auth/whoami, /password, /refresh
│       ├── users.rs        ← /api/users[/:id]
│       ├── clients.rs      ← /api/clients[/:id]
│       ├── cases.rs        ← /api/cases[/:id[/documents|/timeline]]
│       ├── time_entries.rs ← /api/time-entries[/:id]
│       ├── invoices.rs     ← /api/invoices[/:id[/payments]]
│       ├── messages.rs     ← /api/messages[/:id[/read]]
│       └── notices.rs      ← /api/notices[/:id]
│
└── app.rs                  ← Routes wired from handlers::*

Handlers stay thin: extract, check the caller's role, call the service,
wrap the result in ApiResponse. Business rules live in services/.
*/

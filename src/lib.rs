/*!
# Gym Front Desk

Membership check-in and management for a single gym front desk, built in Rust.

## Overview

Every member carries a QR code whose payload is their member key. Scanning the
code at the door validates the subscription and counts the visit. Operators
enroll new members, renew subscriptions, and review revenue, check-in and
subscription figures. The system of record is one spreadsheet file.

## Architecture

### Core
- **Member Store** - Loads and atomically replaces the member table (`.xlsx`)
- **Membership Logic** - Creation, check-in validation and renewal as pure
  functions over the table
- **Session** - Holds the last durable table and applies logic results,
  saving before anything is considered done

### Adapters
- QR rendering and frame decoding
- Analytics and charts
- CSV/XLSX export
- Command-line front desk (`gymdesk`) and web front desk (`gymdesk-web`,
  feature `web`)

## Modules

- **member**: Membership record, tier and subscription period types
- **store**: Spreadsheet persistence and table operations
- **membership**: Check-in, enrollment and renewal rules; the session context
- **qr**: QR code generation and scanning
- **analytics**: Dashboard figures
- **downloader**: Export functionality (CSV, XLSX)
- **graph**: Chart rendering (feature `web`)
- **app**: Routing and handlers (feature `web`)
- **config**: Command-line/environment settings and logging setup

## REST API Endpoints

- `GET /api/members`, `POST /api/members` - List and enroll members
- `GET /api/members/{key}`, `GET /api/members/{key}/qr` - Member details and QR code
- `POST /api/members/{key}/renew` - Renew a subscription
- `POST /api/checkin/{key}`, `POST /api/scan` - Check in by key or camera frame
- `GET /api/analytics`, `GET /api/charts/{name}` - Dashboard data and charts
- `GET /api/export/csv`, `GET /api/export/xlsx` - Download the member table
*/

pub mod analytics;
pub mod config;
pub mod downloader;
pub mod error;
pub mod member;
pub mod membership;
pub mod qr;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use error::{GymError, Result};
pub use member::*;
pub use membership::*;
pub use store::{FieldChanges, MemberStore};

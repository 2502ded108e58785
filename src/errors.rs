//! Startup errors: configuration, pool construction and migrations.
//! Request-time failures live in `types::ApiError`.

use diesel::r2d2;
use diesel::result::Error as DieselError;

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        ParseInt(::std::num::ParseIntError);
        R2D2(r2d2::PoolError);
        Diesel(DieselError);
    }

    errors {
        Migration(reason: String) {
            description("failed to run database migrations")
            display("failed to run database migrations: {}", reason)
        }
    }
}

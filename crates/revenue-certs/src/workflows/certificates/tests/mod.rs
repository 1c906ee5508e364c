mod common;
mod issuance;
mod routing;

//! Enumerated columns shared by several entities.
//!
//! Both enums are stored as their upper-case marketplace spelling so the database
//! stays readable and matches what the seller sees in marketplace exports.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace an order was placed on, or a payout settles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    /// Amazon Seller Central
    #[sea_orm(string_value = "AMAZON")]
    Amazon,
    /// eBay
    #[sea_orm(string_value = "EBAY")]
    Ebay,
}

impl Platform {
    /// Upper-case spelling used in storage and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amazon => "AMAZON",
            Self::Ebay => "EBAY",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AMAZON" => Ok(Self::Amazon),
            "EBAY" => Ok(Self::Ebay),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Kind of refund recorded against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum RefundType {
    /// The whole order total was refunded
    #[sea_orm(string_value = "FULL")]
    Full,
    /// Part of the order was refunded
    #[sea_orm(string_value = "PARTIAL")]
    Partial,
    /// Only shipping charges were refunded
    #[sea_orm(string_value = "SHIPPING")]
    Shipping,
    /// Only collected tax was refunded
    #[sea_orm(string_value = "TAX")]
    Tax,
}

impl RefundType {
    /// Upper-case spelling used in storage and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Partial => "PARTIAL",
            Self::Shipping => "SHIPPING",
            Self::Tax => "TAX",
        }
    }
}

impl fmt::Display for RefundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(Self::Full),
            "PARTIAL" => Ok(Self::Partial),
            "SHIPPING" => Ok(Self::Shipping),
            "TAX" => Ok(Self::Tax),
            other => Err(format!("unknown refund type '{other}'")),
        }
    }
}

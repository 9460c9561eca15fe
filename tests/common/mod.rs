//! Shared fixtures: one organization with a pharmacy supplying a ward.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use medstock::models::{Department, MemberRole, Product, StockBatch, TransferDetails};
use medstock::transfers::builder::build_transfer;
use medstock::transfers::{Actor, NewTransfer, NewTransferItem, OrgContext};

pub struct Hospital {
    pub organization_id: Uuid,
    pub ward: Department,
    pub pharmacy: Department,
    pub saline: Product,
    pub gauze: Product,
}

impl Hospital {
    pub fn new() -> Self {
        let organization_id = Uuid::new_v4();
        Self {
            organization_id,
            ward: department(organization_id, "Ward 3B"),
            pharmacy: department(organization_id, "Central Pharmacy"),
            saline: product(organization_id, "SAL-500", "Saline 500ml"),
            gauze: product(organization_id, "GZ-10", "Gauze 10cm"),
        }
    }

    pub fn departments(&self) -> Vec<Department> {
        vec![self.ward.clone(), self.pharmacy.clone()]
    }

    pub fn products(&self) -> Vec<Product> {
        vec![self.saline.clone(), self.gauze.clone()]
    }

    pub fn nurse(&self) -> OrgContext {
        self.context(MemberRole::Member, vec![self.ward.id], "Nia Okafor")
    }

    pub fn pharmacist(&self) -> OrgContext {
        self.context(MemberRole::Member, vec![self.pharmacy.id], "Sam Lindqvist")
    }

    pub fn admin(&self) -> OrgContext {
        self.context(MemberRole::Admin, Vec::new(), "Robin Achebe")
    }

    pub fn context(&self, role: MemberRole, departments: Vec<Uuid>, name: &str) -> OrgContext {
        OrgContext::new(
            self.organization_id,
            Actor {
                user_id: Uuid::new_v4(),
                name: name.to_string(),
                email: format!("{}@hospital.example", name.to_lowercase().replace(' ', ".")),
                role,
                department_ids: departments,
            },
        )
    }

    /// Ward asks the pharmacy for the given (product, quantity) lines.
    pub fn request(&self, lines: &[(Uuid, i32)]) -> NewTransfer {
        NewTransfer {
            requesting_department_id: self.ward.id,
            supplying_department_id: self.pharmacy.id,
            title: "Weekly restock".to_string(),
            priority: Default::default(),
            reason: None,
            notes: None,
            items: lines
                .iter()
                .map(|(product_id, quantity)| NewTransferItem {
                    product_id: *product_id,
                    requested_quantity: *quantity,
                    notes: None,
                })
                .collect(),
        }
    }

    pub fn create(&self, lines: &[(Uuid, i32)]) -> TransferDetails {
        build_transfer(
            &self.request(lines),
            "TRF-20261019-0001".to_string(),
            &self.nurse(),
            &self.departments(),
            &self.products(),
            now(),
        )
        .expect("valid transfer request")
    }

    pub fn pharmacy_batch(
        &self,
        product: &Product,
        lot: &str,
        expiry: Option<NaiveDate>,
        quantity: i32,
    ) -> StockBatch {
        batch(self.organization_id, self.pharmacy.id, product.id, lot, expiry, quantity)
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn department(organization_id: Uuid, name: &str) -> Department {
    Department {
        id: Uuid::new_v4(),
        organization_id,
        name: name.to_string(),
        code: None,
        is_active: true,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn product(organization_id: Uuid, sku: &str, name: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        organization_id,
        name: name.to_string(),
        sku: sku.to_string(),
        unit: "unit".to_string(),
        is_active: true,
        created_at: now(),
        updated_at: now(),
    }
}

pub fn batch(
    organization_id: Uuid,
    department_id: Uuid,
    product_id: Uuid,
    lot: &str,
    expiry: Option<NaiveDate>,
    quantity: i32,
) -> StockBatch {
    StockBatch {
        id: Uuid::new_v4(),
        organization_id,
        department_id,
        product_id,
        lot_number: lot.to_string(),
        expiry_date: expiry,
        quantity_available: quantity,
        created_at: now(),
        updated_at: now(),
    }
}

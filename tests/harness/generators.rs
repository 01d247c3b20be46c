// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use contact_shield::models::ContactForm;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client identities.
pub fn generate_clients(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c)).to_string()
        })
        .collect()
}

/// A valid form with a unique email address.
pub fn valid_form(index: usize) -> ContactForm {
    ContactForm {
        name: format!("Visitor {index}"),
        email: format!("visitor{index}@example.com"),
        message: "Hello, I would like to know more about your services.".to_string(),
    }
}

/// A form that trips the spam keyword threshold.
pub fn spam_form(index: usize) -> ContactForm {
    ContactForm {
        name: format!("Promo {index}"),
        email: format!("promo{index}@example.com"),
        message: "BUY NOW! Click here for free money and cheap viagra, limited time!".to_string(),
    }
}

/// A well-formed message from a throwaway mailbox.
pub fn disposable_form(index: usize) -> ContactForm {
    let domains = ["mailinator.com", "10minutemail.com", "guerrillamail.com"];
    ContactForm {
        name: format!("Ghost {index}"),
        email: format!("ghost{index}@{}", domains[index % domains.len()]),
        message: "Hello, I would like to know more about your services.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_clients() {
        let clients = generate_clients(256);
        assert_eq!(clients.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = clients.iter().collect();
        assert_eq!(unique.len(), 256);
        assert_eq!(clients[1], "10.0.0.1");
    }
}

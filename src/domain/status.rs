//! Statuts des documents: variantes fermées avec table de transitions
//! explicite par type de document. Un changement de statut absent de la
//! table est rejeté avant toute logique métier.

use crate::domain::ServiceError;

macro_rules! status_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn parse(s: &str) -> Result<Self, ServiceError> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(ServiceError::Validation(format!(
                        "Statut invalide: {}",
                        s
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(DevisStatus {
    Brouillon => "brouillon",
    Envoye => "envoyé",
    Accepte => "accepté",
    Refuse => "refusé",
    Expire => "expiré",
    TransformeEnCommande => "transformé_en_commande",
    TransformeEnFacture => "transformé_en_facture",
    TransformeEnBl => "transformé_en_bl",
});

impl DevisStatus {
    pub fn can_transition_to(self, to: Self) -> bool {
        use DevisStatus::*;
        matches!(
            (self, to),
            (Brouillon, Envoye)
                | (Brouillon, Accepte)
                | (Brouillon, Refuse)
                | (Brouillon, TransformeEnCommande)
                | (Brouillon, TransformeEnFacture)
                | (Brouillon, TransformeEnBl)
                | (Envoye, Accepte)
                | (Envoye, Refuse)
                | (Envoye, Expire)
                | (Envoye, TransformeEnCommande)
                | (Envoye, TransformeEnFacture)
                | (Envoye, TransformeEnBl)
                | (Accepte, TransformeEnCommande)
                | (Accepte, TransformeEnFacture)
                | (Accepte, TransformeEnBl)
                | (Expire, Envoye)
        )
    }

    /// Un devis déjà transformé ou refusé ne peut plus être converti.
    pub fn is_convertible(self) -> bool {
        use DevisStatus::*;
        matches!(self, Brouillon | Envoye | Accepte)
    }
}

status_enum!(BonLivraisonStatus {
    Brouillon => "brouillon",
    Envoyee => "envoyée",
    Valide => "validé",
    Livre => "livré",
    Paye => "payé",
    PartiellementPayee => "partiellement_payée",
    Facture => "facturé",
    Annulee => "annulée",
});

impl BonLivraisonStatus {
    pub fn can_transition_to(self, to: Self) -> bool {
        use BonLivraisonStatus::*;
        matches!(
            (self, to),
            (Brouillon, Envoyee)
                | (Brouillon, Valide)
                | (Brouillon, Livre)
                | (Brouillon, Paye)
                | (Brouillon, PartiellementPayee)
                | (Brouillon, Annulee)
                | (Envoyee, Valide)
                | (Envoyee, Livre)
                | (Envoyee, Annulee)
                | (Valide, Livre)
                | (Valide, Annulee)
                | (Livre, Paye)
                | (Livre, PartiellementPayee)
                | (Livre, Facture)
                | (Livre, Annulee)
                | (PartiellementPayee, Paye)
                | (PartiellementPayee, Annulee)
                | (Paye, Facture)
                | (Annulee, Brouillon)
                | (Annulee, Envoyee)
                | (Annulee, Valide)
                | (Annulee, Livre)
        )
    }

    /// Un bon livré ou facturé ne peut plus être supprimé.
    pub fn is_deletable(self) -> bool {
        use BonLivraisonStatus::*;
        !matches!(self, Livre | Facture)
    }
}

status_enum!(FactureStatus {
    Brouillon => "brouillon",
    Payee => "payée",
    PartiellementPayee => "partiellement_payée",
    Annulee => "annulée",
});

impl FactureStatus {
    pub fn can_transition_to(self, to: Self) -> bool {
        use FactureStatus::*;
        matches!(
            (self, to),
            (Brouillon, Payee)
                | (Brouillon, PartiellementPayee)
                | (Brouillon, Annulee)
                | (PartiellementPayee, Payee)
                | (PartiellementPayee, Annulee)
                | (Payee, Annulee)
                | (Annulee, Brouillon)
                | (Annulee, PartiellementPayee)
                | (Annulee, Payee)
        )
    }
}

status_enum!(BonAvoirStatus {
    Brouillon => "brouillon",
    Valide => "valide",
    Utilise => "utilise",
    Annule => "annule",
});

impl BonAvoirStatus {
    pub fn can_transition_to(self, to: Self) -> bool {
        use BonAvoirStatus::*;
        matches!(
            (self, to),
            (Brouillon, Valide) | (Brouillon, Annule) | (Valide, Utilise) | (Valide, Annule)
        )
    }
}

status_enum!(BonAchatStatus {
    Brouillon => "brouillon",
    Commande => "commandé",
    PartiellementRecu => "partiellement_reçu",
    Recu => "reçu",
    PartiellementPaye => "partiellement_payé",
    Paye => "payé",
    Annule => "annulé",
});

impl BonAchatStatus {
    pub fn can_transition_to(self, to: Self) -> bool {
        use BonAchatStatus::*;
        matches!(
            (self, to),
            (Brouillon, Commande)
                | (Brouillon, Annule)
                | (Commande, PartiellementRecu)
                | (Commande, Recu)
                | (Commande, Annule)
                | (PartiellementRecu, Recu)
                | (PartiellementRecu, PartiellementPaye)
                | (PartiellementRecu, Annule)
                | (Recu, PartiellementPaye)
                | (Recu, Paye)
                | (PartiellementPaye, Paye)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(FactureStatus::parse("en_cours").is_err());
        assert!(BonLivraisonStatus::parse("livré").is_ok());
    }

    #[test]
    fn facture_cancel_round_trip_is_allowed() {
        assert!(FactureStatus::Brouillon.can_transition_to(FactureStatus::Annulee));
        assert!(FactureStatus::Annulee.can_transition_to(FactureStatus::Brouillon));
    }

    #[test]
    fn paid_bon_achat_is_terminal() {
        for to in [
            BonAchatStatus::Brouillon,
            BonAchatStatus::Commande,
            BonAchatStatus::Annule,
        ] {
            assert!(!BonAchatStatus::Paye.can_transition_to(to));
        }
    }

    #[test]
    fn transformed_devis_is_not_convertible() {
        assert!(!DevisStatus::TransformeEnCommande.is_convertible());
        assert!(DevisStatus::Accepte.is_convertible());
    }
}

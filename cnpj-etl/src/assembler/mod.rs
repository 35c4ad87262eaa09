//! Assembly of nested company documents from a company row, its grouped child rows and the
//! reference lookups.

pub mod codes;
pub mod document;
pub mod layout;

pub use document::{
    Address, CodeDescription, CodeName, CompanyDocument, Contact, Document,
    EstablishmentDocument, LegalRepresentative, PartnerDocument, SimplesDocument,
};

use crate::bail;
use crate::conversions::date::parse_registry_date;
use crate::conversions::decimal::parse_locale_decimal;
use crate::error::{ErrorKind, EtlResult};
use crate::reference::{LookupKind, Lookups};
use crate::types::SourceRow;

use self::codes::{
    company_size_description, partner_type_description, registration_status_description,
};
use self::layout::{empresas, estabelecimentos, simples, socios};

/// Placeholder the registry publishes instead of an absent legal representative.
const MASKED_REPRESENTATIVE: &str = "***000000**";

/// Builds [`CompanyDocument`]s. Assembly is pure, the same input always yields the same
/// document.
#[derive(Debug, Clone)]
pub struct Assembler {
    lookups: Lookups,
    decimal_separator: char,
}

impl Assembler {
    pub fn new(lookups: Lookups, decimal_separator: char) -> Assembler {
        Assembler {
            lookups,
            decimal_separator,
        }
    }

    /// Joins one company row with its establishment, partner and Simples rows.
    ///
    /// Fails with [`ErrorKind::MissingMandatoryField`] when the company has no
    /// `cnpj_basico`. The last Simples row wins when the company has several.
    pub fn assemble(
        &self,
        company: &SourceRow,
        establishments: &[SourceRow],
        partners: &[SourceRow],
        simples_rows: &[SourceRow],
    ) -> EtlResult<CompanyDocument> {
        let Some(base_cnpj) = company.get(empresas::CNPJ_BASICO) else {
            bail!(
                ErrorKind::MissingMandatoryField,
                "Company row has no cnpj_basico"
            );
        };

        let mut establishment_documents: Vec<_> = establishments
            .iter()
            .map(|row| self.establishment(row))
            .collect();
        establishment_documents.sort_by(|a, b| {
            (!a.headquarters, &a.cnpj).cmp(&(!b.headquarters, &b.cnpj))
        });

        Ok(CompanyDocument {
            id: base_cnpj.to_string(),
            base_cnpj: base_cnpj.to_string(),
            corporate_name: owned(company.get(empresas::RAZAO_SOCIAL)),
            legal_nature: self.enriched(
                LookupKind::Naturezas,
                company.get(empresas::NATUREZA_JURIDICA),
            ),
            responsible_qualification: self.enriched(
                LookupKind::Qualificacoes,
                company.get(empresas::QUALIFICACAO_RESPONSAVEL),
            ),
            share_capital: parse_locale_decimal(
                company.get(empresas::CAPITAL_SOCIAL),
                self.decimal_separator,
            ),
            size: company.get(empresas::PORTE).map(|code| {
                CodeDescription::new(Some(code), Some(company_size_description(Some(code))))
            }),
            federative_entity: owned(company.get(empresas::ENTE_FEDERATIVO)),
            establishments: establishment_documents,
            partners: partners.iter().map(|row| self.partner(row)).collect(),
            simples: simples_rows.last().map(simples_document),
        })
    }

    fn establishment(&self, row: &SourceRow) -> EstablishmentDocument {
        use estabelecimentos as col;

        let base = row.get(col::CNPJ_BASICO).unwrap_or_default();
        let order = row.get(col::CNPJ_ORDEM).unwrap_or_default();
        let check_digits = row.get(col::CNPJ_DV).unwrap_or_default();
        let status = row.get(col::SITUACAO_CADASTRAL);

        EstablishmentDocument {
            cnpj: format!("{base}{order}{check_digits}"),
            formatted_cnpj: format!(
                "{}.{}.{}/{order}-{check_digits}",
                char_slice(base, 0, 2),
                char_slice(base, 2, 5),
                char_slice(base, 5, 8)
            ),
            headquarters: row.get(col::MATRIZ_FILIAL) == Some("1"),
            trade_name: owned(row.get(col::NOME_FANTASIA)),
            registration_status: CodeDescription::new(
                status,
                Some(registration_status_description(status)),
            ),
            registration_status_date: parse_registry_date(row.get(col::DATA_SITUACAO_CADASTRAL)),
            registration_status_reason: self
                .enriched(LookupKind::Motivos, row.get(col::MOTIVO_SITUACAO)),
            activity_start_date: parse_registry_date(row.get(col::DATA_INICIO_ATIVIDADE)),
            main_activity: self.enriched(LookupKind::Cnaes, row.get(col::CNAE_PRINCIPAL)),
            secondary_activities: row
                .get(col::CNAE_SECUNDARIO)
                .map(|codes| codes.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            address: Address {
                street_type: owned(row.get(col::TIPO_LOGRADOURO)),
                street: owned(row.get(col::LOGRADOURO)),
                number: owned(row.get(col::NUMERO)),
                complement: owned(row.get(col::COMPLEMENTO)),
                district: owned(row.get(col::BAIRRO)),
                cep: owned(row.get(col::CEP)),
                uf: owned(row.get(col::UF)),
                municipality: self.named(LookupKind::Municipios, row.get(col::MUNICIPIO)),
                country: self.named(LookupKind::Paises, row.get(col::PAIS)),
            },
            contact: contact(row),
        }
    }

    fn partner(&self, row: &SourceRow) -> PartnerDocument {
        use socios as col;

        let kind = row.get(col::TIPO_SOCIO);
        let legal_representative = row
            .get(col::REPRESENTANTE_LEGAL)
            .filter(|document| *document != MASKED_REPRESENTATIVE)
            .map(|document| {
                let qualification = row.get(col::QUALIFICACAO_REPRESENTANTE);
                LegalRepresentative {
                    document: document.to_string(),
                    name: owned(row.get(col::NOME_REPRESENTANTE)),
                    qualification: CodeDescription::new(
                        qualification,
                        qualification
                            .and_then(|code| self.lookups.get(LookupKind::Qualificacoes, code)),
                    ),
                }
            });

        PartnerDocument {
            kind: CodeDescription::new(kind, Some(partner_type_description(kind))),
            name: owned(row.get(col::NOME)),
            document: owned(row.get(col::DOCUMENTO)),
            qualification: self.enriched(LookupKind::Qualificacoes, row.get(col::QUALIFICACAO)),
            entry_date: parse_registry_date(row.get(col::DATA_ENTRADA)),
            country: self.named(LookupKind::Paises, row.get(col::PAIS)),
            legal_representative,
            age_group: owned(row.get(col::FAIXA_ETARIA)),
        }
    }

    fn enriched(&self, kind: LookupKind, code: Option<&str>) -> Option<CodeDescription> {
        let code = code?;
        Some(CodeDescription::new(Some(code), self.lookups.get(kind, code)))
    }

    fn named(&self, kind: LookupKind, code: Option<&str>) -> Option<CodeName> {
        let code = code?;
        Some(CodeName {
            code: code.to_string(),
            name: owned(self.lookups.get(kind, code)),
        })
    }
}

fn simples_document(row: &SourceRow) -> SimplesDocument {
    SimplesDocument {
        simples_opted: row.get(simples::OPCAO_SIMPLES) == Some("S"),
        simples_opted_on: parse_registry_date(row.get(simples::DATA_OPCAO_SIMPLES)),
        simples_excluded_on: parse_registry_date(row.get(simples::DATA_EXCLUSAO_SIMPLES)),
        mei_opted: row.get(simples::OPCAO_MEI) == Some("S"),
        mei_opted_on: parse_registry_date(row.get(simples::DATA_OPCAO_MEI)),
        mei_excluded_on: parse_registry_date(row.get(simples::DATA_EXCLUSAO_MEI)),
    }
}

fn contact(row: &SourceRow) -> Option<Contact> {
    use estabelecimentos as col;

    let contact = Contact {
        phone1: phone(row.get(col::DDD1), row.get(col::TELEFONE1)),
        phone2: phone(row.get(col::DDD2), row.get(col::TELEFONE2)),
        fax: phone(row.get(col::DDD_FAX), row.get(col::FAX)),
        email: row.get(col::EMAIL).map(str::to_lowercase),
    };

    (!contact.is_empty()).then_some(contact)
}

fn phone(area_code: Option<&str>, number: Option<&str>) -> Option<String> {
    Some(format!("({}) {}", area_code?, number?))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Characters `start..end` of `value`, clamped to its length.
fn char_slice(value: &str, start: usize, end: usize) -> &str {
    let byte_index = |position: usize| {
        value
            .char_indices()
            .nth(position)
            .map(|(index, _)| index)
            .unwrap_or(value.len())
    };

    &value[byte_index(start)..byte_index(end)]
}

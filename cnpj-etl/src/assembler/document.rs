use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Generic JSON document handed to document sinks.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A code enriched with its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDescription {
    #[serde(rename = "codigo")]
    pub code: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
}

impl CodeDescription {
    pub fn new(code: Option<&str>, description: Option<&str>) -> CodeDescription {
        CodeDescription {
            code: code.map(str::to_string),
            description: description.map(str::to_string),
        }
    }
}

/// A place code enriched with its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeName {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nome")]
    pub name: Option<String>,
}

/// One company with its establishments, partners and Simples Nacional status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "cnpj_basico")]
    pub base_cnpj: String,
    #[serde(rename = "razao_social")]
    pub corporate_name: Option<String>,
    #[serde(rename = "natureza_juridica")]
    pub legal_nature: Option<CodeDescription>,
    #[serde(rename = "qualificacao_responsavel")]
    pub responsible_qualification: Option<CodeDescription>,
    #[serde(rename = "capital_social")]
    pub share_capital: f64,
    #[serde(rename = "porte")]
    pub size: Option<CodeDescription>,
    #[serde(rename = "ente_federativo")]
    pub federative_entity: Option<String>,
    #[serde(rename = "estabelecimentos")]
    pub establishments: Vec<EstablishmentDocument>,
    #[serde(rename = "socios")]
    pub partners: Vec<PartnerDocument>,
    pub simples: Option<SimplesDocument>,
}

impl CompanyDocument {
    /// Converts the document into the generic form accepted by document sinks.
    pub fn into_document(self) -> EtlResult<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(etl_error!(
                ErrorKind::SerializationError,
                "Company document did not serialize to an object",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishmentDocument {
    pub cnpj: String,
    #[serde(rename = "cnpj_formatado")]
    pub formatted_cnpj: String,
    #[serde(rename = "matriz")]
    pub headquarters: bool,
    #[serde(rename = "nome_fantasia")]
    pub trade_name: Option<String>,
    #[serde(rename = "situacao_cadastral")]
    pub registration_status: CodeDescription,
    #[serde(rename = "data_situacao_cadastral")]
    pub registration_status_date: Option<String>,
    #[serde(rename = "motivo_situacao_cadastral")]
    pub registration_status_reason: Option<CodeDescription>,
    #[serde(rename = "data_inicio_atividade")]
    pub activity_start_date: Option<String>,
    #[serde(rename = "cnae_principal")]
    pub main_activity: Option<CodeDescription>,
    #[serde(rename = "cnaes_secundarios")]
    pub secondary_activities: Vec<String>,
    #[serde(rename = "endereco")]
    pub address: Address,
    #[serde(rename = "contato")]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "tipo_logradouro")]
    pub street_type: Option<String>,
    #[serde(rename = "logradouro")]
    pub street: Option<String>,
    #[serde(rename = "numero")]
    pub number: Option<String>,
    #[serde(rename = "complemento")]
    pub complement: Option<String>,
    #[serde(rename = "bairro")]
    pub district: Option<String>,
    pub cep: Option<String>,
    pub uf: Option<String>,
    #[serde(rename = "municipio")]
    pub municipality: Option<CodeName>,
    #[serde(rename = "pais")]
    pub country: Option<CodeName>,
}

/// Contact entries. Absent entries are left out of the serialized object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "telefone1", skip_serializing_if = "Option::is_none", default)]
    pub phone1: Option<String>,
    #[serde(rename = "telefone2", skip_serializing_if = "Option::is_none", default)]
    pub phone2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.phone1.is_none() && self.phone2.is_none() && self.fax.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerDocument {
    #[serde(rename = "tipo")]
    pub kind: CodeDescription,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "documento")]
    pub document: Option<String>,
    #[serde(rename = "qualificacao")]
    pub qualification: Option<CodeDescription>,
    #[serde(rename = "data_entrada")]
    pub entry_date: Option<String>,
    #[serde(rename = "pais")]
    pub country: Option<CodeName>,
    #[serde(rename = "representante_legal")]
    pub legal_representative: Option<LegalRepresentative>,
    #[serde(rename = "faixa_etaria")]
    pub age_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalRepresentative {
    #[serde(rename = "documento")]
    pub document: String,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "qualificacao")]
    pub qualification: CodeDescription,
}

/// Simples Nacional and MEI tax regime status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplesDocument {
    #[serde(rename = "optante_simples")]
    pub simples_opted: bool,
    #[serde(rename = "data_opcao_simples")]
    pub simples_opted_on: Option<String>,
    #[serde(rename = "data_exclusao_simples")]
    pub simples_excluded_on: Option<String>,
    #[serde(rename = "optante_mei")]
    pub mei_opted: bool,
    #[serde(rename = "data_opcao_mei")]
    pub mei_opted_on: Option<String>,
    #[serde(rename = "data_exclusao_mei")]
    pub mei_excluded_on: Option<String>,
}
